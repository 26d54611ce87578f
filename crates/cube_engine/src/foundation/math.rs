//! Math utilities built on nalgebra
//!
//! Transforms follow the Vulkan clip-space conventions: depth in [0, 1] and
//! +Y pointing down the screen.

pub use nalgebra::{Matrix4, Point3, Vector3};

/// 4x4 single-precision matrix
pub type Mat4 = Matrix4<f32>;

/// 3-component single-precision vector
pub type Vec3 = Vector3<f32>;

/// Camera position of the cube scene
pub const EYE: [f32; 3] = [2.0, 2.0, 2.0];

/// Degrees the model turns per second
pub const DEGREES_PER_SECOND: f32 = 90.0;

/// Vertical field of view in degrees
pub const FOV_Y_DEGREES: f32 = 45.0;

/// Near clip plane distance
pub const Z_NEAR: f32 = 0.1;

/// Far clip plane distance
pub const Z_FAR: f32 = 10.0;

/// Right-handed perspective mapping view depth to [0, 1], Y not flipped
pub fn perspective_rh_zo(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let tan_half_fovy = (fov_y * 0.5).tan();

    let mut result = Mat4::zeros();
    result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
    result[(1, 1)] = 1.0 / tan_half_fovy;
    result[(2, 2)] = far / (near - far);
    result[(2, 3)] = -(far * near) / (far - near);
    result[(3, 2)] = -1.0;
    result
}

/// Rotation of `elapsed_secs * 90°` about +Z
pub fn model_matrix(elapsed_secs: f32) -> Mat4 {
    Mat4::from_axis_angle(&Vec3::z_axis(), (elapsed_secs * DEGREES_PER_SECOND).to_radians())
}

/// Fixed camera looking at the origin with +Z up
pub fn view_matrix() -> Mat4 {
    Mat4::look_at_rh(&Point3::from(EYE), &Point3::origin(), &Vec3::z())
}

/// Scene projection with the Y axis flipped for Vulkan
pub fn projection_matrix(aspect: f32) -> Mat4 {
    let mut proj = perspective_rh_zo(FOV_Y_DEGREES.to_radians(), aspect, Z_NEAR, Z_FAR);
    proj[(1, 1)] *= -1.0;
    proj
}

/// `proj * view * model` for the given time and viewport aspect ratio
pub fn compose_mvp(elapsed_secs: f32, aspect: f32) -> Mat4 {
    projection_matrix(aspect) * view_matrix() * model_matrix(elapsed_secs)
}

/// Width over height, 1.0 for degenerate extents
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector4;

    fn ndc(m: &Mat4, p: [f32; 3]) -> Vec3 {
        let clip = m * Vector4::new(p[0], p[1], p[2], 1.0);
        Vec3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w)
    }

    #[test]
    fn test_depth_maps_near_to_zero_and_far_to_one() {
        let proj = perspective_rh_zo(FOV_Y_DEGREES.to_radians(), 1.0, Z_NEAR, Z_FAR);
        assert_relative_eq!(ndc(&proj, [0.0, 0.0, -Z_NEAR]).z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(ndc(&proj, [0.0, 0.0, -Z_FAR]).z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_projection_flips_y() {
        let proj = projection_matrix(1.0);
        assert!(ndc(&proj, [0.0, 1.0, -5.0]).y < 0.0);
        assert!(proj[(1, 1)] < 0.0);
    }

    #[test]
    fn test_model_rotates_quarter_turn_per_second() {
        let rotated = model_matrix(1.0) * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(rotated.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(rotated.y, 1.0, epsilon = 1e-5);
        assert_relative_eq!(rotated.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_origin_lands_in_front_of_camera_at_screen_center() {
        let mvp = compose_mvp(0.0, 800.0 / 600.0);
        let center = ndc(&mvp, [0.0, 0.0, 0.0]);
        assert_relative_eq!(center.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(center.y, 0.0, epsilon = 1e-5);
        assert!(center.z > 0.0 && center.z < 1.0);
    }

    #[test]
    fn test_aspect_ratio_handles_zero_height() {
        assert_relative_eq!(aspect_ratio(800, 600), 4.0 / 3.0);
        assert_relative_eq!(aspect_ratio(400, 0), 1.0);
    }
}
