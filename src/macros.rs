/// Conversions and arithmetic for `struct Name(pub primitive)` newtypes.
///
/// `impl_newtype!(Price, f64)` only adds `From` in both directions.
/// `impl_newtype!(Reward, f64; signed)` adds `Add`, `Sub`, `Neg`, the
/// assigning forms, `Add<f64>`, and `Sum` on top.
#[macro_export]
macro_rules! impl_newtype {
    (@binop $wrapper:ident, $op:ident, $method:ident, $op_assign:ident, $method_assign:ident) => {
        impl std::ops::$op for $wrapper {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self {
                Self(std::ops::$op::$method(self.0, rhs.0))
            }
        }

        impl std::ops::$op_assign for $wrapper {
            fn $method_assign(&mut self, rhs: Self) {
                std::ops::$op_assign::$method_assign(&mut self.0, rhs.0);
            }
        }
    };

    ($wrapper:ident, $primitive:ty) => {
        impl From<$primitive> for $wrapper {
            fn from(value: $primitive) -> Self {
                Self(value)
            }
        }

        impl From<$wrapper> for $primitive {
            fn from(wrapper: $wrapper) -> Self {
                wrapper.0
            }
        }
    };

    ($wrapper:ident, $primitive:ty; signed) => {
        $crate::impl_newtype!($wrapper, $primitive);
        $crate::impl_newtype!(@binop $wrapper, Add, add, AddAssign, add_assign);
        $crate::impl_newtype!(@binop $wrapper, Sub, sub, SubAssign, sub_assign);

        impl std::ops::Add<$primitive> for $wrapper {
            type Output = Self;

            fn add(self, rhs: $primitive) -> Self {
                Self(self.0 + rhs)
            }
        }

        impl std::ops::Neg for $wrapper {
            type Output = Self;

            fn neg(self) -> Self {
                Self(-self.0)
            }
        }

        impl std::iter::Sum for $wrapper {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}
