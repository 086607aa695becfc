//! This module defines various unit types and their conversions.
//!
//! These are used for technology and storage parameters, where mixing up (say) a cost per kW with
//! a cost per kWh is an easy mistake to make. Inside the optimisation everything is a plain `f64`.

/// Represents a dimensionless quantity.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    PartialOrd,
    Default,
    derive_more::Add,
    derive_more::Sub,
    serde::Deserialize,
    serde::Serialize,
)]
pub struct Dimensionless(pub f64);

impl std::ops::Mul for Dimensionless {
    type Output = Dimensionless;

    fn mul(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 * rhs.0)
    }
}

macro_rules! unit_struct {
    ($name:ident, $symbol:literal) => {
        /// Represents a type of quantity.
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Default,
            derive_more::Add,
            derive_more::Sub,
            derive_more::Display,
            serde::Deserialize,
            serde::Serialize,
        )]
        #[display("{} {}", _0, $symbol)]
        pub struct $name(pub f64);

        impl $name {
            /// Returns the value of the unit type as a f64.
            pub fn value(self) -> f64 {
                self.0
            }

            /// Whether the value is finite
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl std::ops::Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Mul<$name> for Dimensionless {
            type Output = $name;
            fn mul(self, rhs: $name) -> $name {
                $name(self.0 * rhs.0)
            }
        }
    };
}

macro_rules! impl_mul {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Mul<$Rhs> for $Lhs {
            type Output = $Out;
            fn mul(self, rhs: $Rhs) -> $Out {
                <$Out>::from(self.0 * rhs.0)
            }
        }
        impl std::ops::Mul<$Lhs> for $Rhs {
            type Output = $Out;
            fn mul(self, lhs: $Lhs) -> $Out {
                <$Out>::from(self.0 * lhs.0)
            }
        }
    };
}

// Base quantities
unit_struct!(Power, "kW");
unit_struct!(Energy, "kWh");
unit_struct!(Money, "$");

// Derived quantities
unit_struct!(MoneyPerPower, "$/kW");
unit_struct!(MoneyPerEnergy, "$/kWh");

macro_rules! impl_from_f64 {
    ($($name:ty),*) => {
        $(
            impl From<f64> for $name {
                fn from(val: f64) -> Self {
                    Self(val)
                }
            }
        )*
    };
}
impl_from_f64!(Power, Energy, Money, MoneyPerPower, MoneyPerEnergy);

// Multiplication rules
impl_mul!(MoneyPerPower, Power, Money);
impl_mul!(MoneyPerEnergy, Energy, Money);
