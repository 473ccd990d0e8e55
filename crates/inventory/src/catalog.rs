//! Closed tag sets used to classify products (brand, style, category).
//!
//! Tags carry no domain logic. Free text is matched case-insensitively against the
//! labels; unknown text is a validation error, and every set has an explicit
//! `Other` member instead of a silent fallback.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use lotstock_core::DomainError;

macro_rules! closed_tag {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_lowercase();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|tag| tag.label().to_lowercase() == wanted)
                    .ok_or_else(|| {
                        DomainError::validation(format!("unknown {}: '{}'", $kind, s.trim()))
                    })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

closed_tag! {
    /// Manufacturer / brand line.
    Brand, "brand" {
        Eudora => "Eudora",
        Boticario => "O Boticário",
        Jequiti => "Jequiti",
        Avon => "Avon",
        MaryKay => "Mary Kay",
        Natura => "Natura",
        Oui => "Oui",
        PierreAlexander => "Pierre Alexander",
        Tupperware => "Tupperware",
        Other => "Other",
    }
}

closed_tag! {
    /// Shelf / catalog style.
    Style, "style" {
        Perfumery => "Perfumery",
        Skincare => "Skincare",
        Hair => "Hair",
        BodyAndBath => "Body & Bath",
        Makeup => "Makeup",
        Men => "Men",
        Women => "Women",
        Kids => "Kids",
        Home => "Home",
        SunCare => "Sun Care",
        Teen => "Teen",
        KitsAndGifts => "Kits & Gifts",
        BodyCare => "Body Care",
        NewReleases => "New Releases",
        HomeAccessories => "Home Accessories",
        Other => "Other",
    }
}

closed_tag! {
    /// Product type.
    Category, "category" {
        MensFragrance => "Men's Fragrance",
        WomensFragrance => "Women's Fragrance",
        KidsFragrance => "Kids' Fragrance",
        BodySplash => "Body Splash",
        BodySpray => "Body Spray",
        EauDeParfum => "Eau de Parfum",
        Cologne => "Cologne",
        Deodorant => "Deodorant",
        RollOn => "Roll-On",
        AntiAging => "Anti-Aging",
        FacialSunscreen => "Facial Sunscreen",
        Cleanser => "Cleanser",
        Exfoliant => "Exfoliant",
        Toner => "Toner",
        Serum => "Serum",
        Mask => "Mask",
        Shampoo => "Shampoo",
        Conditioner => "Conditioner",
        LeaveIn => "Leave-In",
        HairTreatment => "Hair Treatment",
        Lips => "Lips",
        Eyes => "Eyes",
        Eyebrows => "Eyebrows",
        Brushes => "Brushes",
        Palette => "Palette",
        Nails => "Nails",
        Moisturizer => "Moisturizer",
        BodyOil => "Body Oil",
        HandCream => "Hand Cream",
        FootCream => "Foot Cream",
        IntimateCare => "Intimate Care",
        Sunscreen => "Sunscreen",
        AfterSun => "After Sun",
        BarSoap => "Bar Soap",
        LiquidSoap => "Liquid Soap",
        Beard => "Beard",
        Kit => "Kit",
        Bottles => "Bottles",
        Storage => "Storage",
        Microwave => "Microwave",
        Serving => "Serving",
        FoodPrep => "Food Prep",
        Outdoor => "Outdoor",
        Gifts => "Gifts",
        Other => "Other",
    }
}
