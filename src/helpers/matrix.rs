// Matrix helpers
//
// Vulkan clip space has Y pointing down and depth in 0..1, so the
// projections below flip Y on top of glam's right-handed 0..1 variants.

use glam::{Mat4, Vec3};

pub fn prepare_translation_matrix(x: f32, y: f32, z: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(x, y, z))
}

/// Rotation of `angle` degrees around `axis`. A zero axis yields identity.
pub fn prepare_rotation_matrix(angle: f32, axis: Vec3) -> Mat4 {
    match axis.try_normalize() {
        Some(axis) => Mat4::from_axis_angle(axis, angle.to_radians()),
        None => {
            log::warn!("Rotation axis is zero, using identity");
            Mat4::IDENTITY
        }
    }
}

pub fn prepare_scaling_matrix(x: f32, y: f32, z: f32) -> Mat4 {
    Mat4::from_scale(Vec3::new(x, y, z))
}

/// `field_of_view` is vertical, in degrees.
pub fn prepare_perspective_projection_matrix(aspect_ratio: f32, field_of_view: f32, near: f32, far: f32) -> Mat4 {
    let mut projection = Mat4::perspective_rh(field_of_view.to_radians(), aspect_ratio, near, far);
    projection.y_axis.y = -projection.y_axis.y;
    projection
}

pub fn prepare_orthographic_projection_matrix(
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    near: f32,
    far: f32,
) -> Mat4 {
    let mut projection = Mat4::orthographic_rh(left, right, bottom, top, near, far);
    projection.y_axis.y = -projection.y_axis.y;
    projection.w_axis.y = -projection.w_axis.y;
    projection
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    const EPS: f32 = 1e-5;

    #[test]
    fn translation_and_scaling() {
        let p = prepare_translation_matrix(1.0, 2.0, 3.0).transform_point3(Vec3::ZERO);
        assert!(p.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), EPS));

        let p = prepare_scaling_matrix(2.0, 3.0, 4.0).transform_point3(Vec3::ONE);
        assert!(p.abs_diff_eq(Vec3::new(2.0, 3.0, 4.0), EPS));
    }

    #[test]
    fn rotation_uses_degrees_and_normalizes_axis() {
        let rotation = prepare_rotation_matrix(90.0, Vec3::new(0.0, 0.0, 5.0));
        let p = rotation.transform_vector3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::Y, EPS));

        assert_eq!(prepare_rotation_matrix(45.0, Vec3::ZERO), Mat4::IDENTITY);
    }

    #[test]
    fn perspective_maps_depth_to_zero_one_and_flips_y() {
        let projection = prepare_perspective_projection_matrix(1.0, 90.0, 0.5, 10.0);

        let near = projection * Vec4::new(0.0, 0.0, -0.5, 1.0);
        assert!((near.z / near.w).abs() < EPS);

        let far = projection * Vec4::new(0.0, 0.0, -10.0, 1.0);
        assert!((far.z / far.w - 1.0).abs() < EPS);

        let up = projection * Vec4::new(0.0, 1.0, -1.0, 1.0);
        assert!(up.y / up.w < 0.0);
    }

    #[test]
    fn orthographic_flips_y() {
        let projection = prepare_orthographic_projection_matrix(-1.0, 1.0, -1.0, 1.0, 0.0, 1.0);

        let top = projection.transform_point3(Vec3::new(0.0, 1.0, 0.0));
        assert!((top.y + 1.0).abs() < EPS);

        let far = projection.transform_point3(Vec3::new(0.0, 0.0, -1.0));
        assert!((far.z - 1.0).abs() < EPS);
    }
}
