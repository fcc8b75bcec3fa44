//! Perspective camera description and its ground footprint.

use nalgebra::Vector3;

use super::SchemeError;

/// A perspective camera in the scene frame (z up).
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Eye position.
    pub position: Vector3<f64>,
    /// Viewing direction; need not be normalized.
    pub direction: Vector3<f64>,
    /// Approximate up vector used to orient the image plane.
    pub up: Vector3<f64>,
    /// Vertical field of view in radians.
    pub fov_y: f64,
    /// Viewport width divided by height.
    pub aspect: f64,
    /// Viewport height in pixels.
    pub viewport_height: f64,
}

impl Camera {
    /// Creates a camera at `position` looking at `target`.
    pub fn looking_at(
        position: Vector3<f64>,
        target: Vector3<f64>,
        fov_y_degrees: f64,
        viewport: (f64, f64),
    ) -> Self {
        Self {
            position,
            direction: target - position,
            up: Vector3::z(),
            fov_y: fov_y_degrees.to_radians(),
            aspect: viewport.0 / viewport.1,
            viewport_height: viewport.1,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SchemeError> {
        let finite = |v: &Vector3<f64>| v.iter().all(|c| c.is_finite());
        if !finite(&self.position) || !finite(&self.direction) || !finite(&self.up) {
            return Err(SchemeError::InvalidCamera("non-finite vector".to_string()));
        }
        if self.direction.norm() < f64::EPSILON {
            return Err(SchemeError::InvalidCamera("zero view direction".to_string()));
        }
        if !(self.fov_y > 0.0 && self.fov_y < std::f64::consts::PI) {
            return Err(SchemeError::InvalidCamera(format!(
                "field of view {} rad out of range",
                self.fov_y
            )));
        }
        if !(self.aspect.is_finite() && self.aspect > 0.0) {
            return Err(SchemeError::InvalidCamera(format!(
                "aspect ratio {}",
                self.aspect
            )));
        }
        if !(self.viewport_height.is_finite() && self.viewport_height > 0.0) {
            return Err(SchemeError::InvalidCamera(format!(
                "viewport height {}",
                self.viewport_height
            )));
        }
        Ok(())
    }

    /// Unit forward, right and up vectors of the image plane.
    ///
    /// When the view direction is parallel to `up` (looking straight down with
    /// a z-up vector) the scene's +y axis orients the image instead.
    pub fn basis(&self) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        let forward = self.direction.normalize();
        let mut right = forward.cross(&self.up);
        if right.norm() < 1e-9 {
            right = forward.cross(&Vector3::y());
        }
        let right = right.normalize();
        let up = right.cross(&forward);
        (forward, right, up)
    }

    /// Rays through the center and the four corners of the viewport.
    pub fn view_rays(&self) -> [Vector3<f64>; 5] {
        let (forward, right, up) = self.basis();
        let tan_v = (self.fov_y / 2.0).tan();
        let tan_h = tan_v * self.aspect;
        let corner = |sx: f64, sy: f64| forward + right * (sx * tan_h) + up * (sy * tan_v);
        [
            forward,
            corner(-1.0, -1.0),
            corner(1.0, -1.0),
            corner(1.0, 1.0),
            corner(-1.0, 1.0),
        ]
    }

    /// Ground size of one screen pixel at `distance` from the eye.
    pub fn pixel_footprint(&self, distance: f64) -> f64 {
        2.0 * distance * (self.fov_y / 2.0).tan() / self.viewport_height
    }
}

/// Axis-aligned ground region seen by the camera, in CRS coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundFootprint {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    /// Where the view's center ray meets the ground.
    pub focus: (f64, f64),
    /// Eye-to-focus distance, used for level selection.
    pub focus_distance: f64,
}

impl GroundFootprint {
    /// Projects the view onto the ground plane `z = -scene_center.z`.
    ///
    /// Rays that never reach the ground (at or above the horizon) and hits
    /// beyond `max_distance` are clamped to `max_distance` horizontally so an
    /// oblique view still yields a bounded footprint. Returns `None` when the
    /// eye is on or below the ground plane.
    pub fn project(
        camera: &Camera,
        scene_center: &Vector3<f64>,
        max_distance: f64,
    ) -> Option<Self> {
        let ground_z = -scene_center.z;
        let height = camera.position.z - ground_z;
        if height <= f64::EPSILON {
            return None;
        }

        let rays = camera.view_rays();
        let mut points = Vec::with_capacity(rays.len());
        let mut focus = None;

        for (i, ray) in rays.iter().enumerate() {
            let point = ground_hit(&camera.position, ray, height, max_distance);
            if i == 0 {
                focus = point;
            }
            if let Some(p) = point {
                points.push(p);
            }
        }

        if points.is_empty() {
            return None;
        }

        let (min_x, max_x) = min_max(points.iter().map(|p| p.0));
        let (min_y, max_y) = min_max(points.iter().map(|p| p.1));

        // Only a ray pointing straight up has no ground point
        let (focus_x, focus_y) = focus.unwrap_or(((min_x + max_x) / 2.0, (min_y + max_y) / 2.0));
        let dx = focus_x - camera.position.x;
        let dy = focus_y - camera.position.y;
        let focus_distance = (dx * dx + dy * dy + height * height).sqrt();

        Some(Self {
            min_x: min_x + scene_center.x,
            min_y: min_y + scene_center.y,
            max_x: max_x + scene_center.x,
            max_y: max_y + scene_center.y,
            focus: (focus_x + scene_center.x, focus_y + scene_center.y),
            focus_distance,
        })
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Ground point (scene frame x, y) a ray reaches, clamped horizontally.
fn ground_hit(
    eye: &Vector3<f64>,
    ray: &Vector3<f64>,
    height: f64,
    max_distance: f64,
) -> Option<(f64, f64)> {
    let horizontal = (ray.x * ray.x + ray.y * ray.y).sqrt();

    if ray.z < -1e-9 {
        let t = height / -ray.z;
        let reach = horizontal * t;
        if reach <= max_distance {
            return Some((eye.x + ray.x * t, eye.y + ray.y * t));
        }
    }

    if horizontal < 1e-12 {
        return None;
    }
    let scale = max_distance / horizontal;
    Some((eye.x + ray.x * scale, eye.y + ray.y * scale))
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn top_down(height: f64) -> Camera {
        Camera {
            position: Vector3::new(0.0, 0.0, height),
            direction: Vector3::new(0.0, 0.0, -1.0),
            up: Vector3::y(),
            fov_y: 60f64.to_radians(),
            aspect: 1.0,
            viewport_height: 512.0,
        }
    }

    #[test]
    fn test_basis_is_orthonormal() {
        let camera = Camera::looking_at(
            Vector3::new(0.0, -500.0, 300.0),
            Vector3::zeros(),
            50.0,
            (1280.0, 720.0),
        );
        let (f, r, u) = camera.basis();

        assert!((f.norm() - 1.0).abs() < 1e-9);
        assert!(f.dot(&r).abs() < 1e-9);
        assert!(f.dot(&u).abs() < 1e-9);
        assert!(u.z > 0.0, "image up should point skywards");
    }

    #[test]
    fn test_straight_down_with_z_up_falls_back_to_y() {
        let mut camera = top_down(100.0);
        camera.up = Vector3::z();
        let (_, right, up) = camera.basis();
        assert!((right.norm() - 1.0).abs() < 1e-9);
        assert!((up.norm() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_top_down_footprint_is_square() {
        let footprint =
            GroundFootprint::project(&top_down(1000.0), &Vector3::new(2000.0, 2000.0, 0.0), 8000.0)
                .unwrap();

        let half = 1000.0 * 30f64.to_radians().tan();
        assert!((footprint.min_x - (2000.0 - half)).abs() < 1e-6);
        assert!((footprint.max_x - (2000.0 + half)).abs() < 1e-6);
        assert!((footprint.min_y - (2000.0 - half)).abs() < 1e-6);
        assert!((footprint.max_y - (2000.0 + half)).abs() < 1e-6);
        assert!((footprint.focus.0 - 2000.0).abs() < 1e-6);
        assert!((footprint.focus_distance - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_horizon_rays_are_clamped() {
        let camera = Camera {
            position: Vector3::new(0.0, 0.0, 100.0),
            direction: Vector3::new(0.0, 1.0, 0.0),
            up: Vector3::z(),
            fov_y: 60f64.to_radians(),
            aspect: 1.0,
            viewport_height: 512.0,
        };
        let footprint = GroundFootprint::project(&camera, &Vector3::zeros(), 800.0).unwrap();

        assert!(footprint.max_y <= 800.0 + 1e-6);
        assert!(footprint.width() <= 1600.0 + 1e-6);
    }

    #[test]
    fn test_camera_on_ground_has_no_footprint() {
        let camera = top_down(0.0);
        assert!(GroundFootprint::project(&camera, &Vector3::zeros(), 1000.0).is_none());
    }

    #[test]
    fn test_validate_rejects_bad_fov() {
        let mut camera = top_down(10.0);
        camera.fov_y = 0.0;
        assert!(matches!(camera.validate(), Err(SchemeError::InvalidCamera(_))));
    }

    #[test]
    fn test_pixel_footprint() {
        let camera = top_down(1000.0);
        let expected = 2.0 * 1000.0 * 30f64.to_radians().tan() / 512.0;
        assert!((camera.pixel_footprint(1000.0) - expected).abs() < 1e-12);
    }
}
