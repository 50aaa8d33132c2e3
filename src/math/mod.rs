//! Vector math helpers on top of glam

use glam::{Vec2, Vec3, Vec4};

/// Angle and projection helpers shared by the glam vector types.
pub trait VectorExt: Copy {
    /// Angle in radians between `self` and `other`.
    ///
    /// Returns 0 when either vector has zero length.
    fn angle_with(self, other: Self) -> f32;

    /// Angle in radians between two unit vectors.
    fn angle_with_unit(self, other: Self) -> f32;

    /// Projection of `self` onto `other`; zero if `other` is zero.
    fn projected_on(self, other: Self) -> Self;
}

macro_rules! impl_vector_ext {
    ($($ty:ty),*) => {$(
        impl VectorExt for $ty {
            fn angle_with(self, other: Self) -> f32 {
                let lengths = self.length() * other.length();
                if lengths <= f32::EPSILON {
                    return 0.0;
                }
                (self.dot(other) / lengths).clamp(-1.0, 1.0).acos()
            }

            fn angle_with_unit(self, other: Self) -> f32 {
                self.dot(other).clamp(-1.0, 1.0).acos()
            }

            fn projected_on(self, other: Self) -> Self {
                let length_squared = other.length_squared();
                if length_squared <= f32::EPSILON {
                    return <$ty>::ZERO;
                }
                other * (self.dot(other) / length_squared)
            }
        }
    )*};
}

impl_vector_ext!(Vec2, Vec3, Vec4);
