//! Selectable attribute values of a complex product, as seen from one of its variants.

use crate::attribute::Attribute;
use crate::product::Product;
use crate::{Slug, Unit};
use serde::Serialize;
use typesafe_repository::IdentityOf;

/// Ordered from weakest to strongest.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChoiceDisplay {
    Unreachable,
    Reachable,
    Selected,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ChoiceValue {
    pub value: String,
    pub unit: Option<Unit>,
    pub display: ChoiceDisplay,
    /// Sibling variant to switch to. `None` for the selected value.
    pub variant_id: Option<IdentityOf<Product>>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AttributeChoice {
    pub name: String,
    pub slug: Slug,
    pub values: Vec<ChoiceValue>,
}

impl AttributeChoice {
    pub fn value(&self, value: &str) -> Option<&ChoiceValue> {
        self.values.iter().find(|v| v.value == value)
    }
}

/// Builds the attribute choices of `parent` relative to the variant `current`
/// (the default variant when `None`).
///
/// Returns `None` if `parent` has no variants, `current` is not one of them
/// or the current variant carries no attributes.
pub fn resolve_choices(
    parent: &Product,
    current: Option<&IdentityOf<Product>>,
) -> Option<Vec<AttributeChoice>> {
    let current = match current {
        Some(id) => parent.variant(id)?,
        None => parent.default_variant()?,
    };
    let selected = current.attributes();
    if selected.is_empty() {
        return None;
    }
    let mut choices: Vec<AttributeChoice> = vec![];
    for variant in parent.variants() {
        let attributes = variant.attributes();
        for (i, attr) in attributes.iter().enumerate() {
            let display = display_of(selected, attributes, i);
            let variant_id = (display != ChoiceDisplay::Selected).then_some(variant.id);
            let choice = match choices.iter_mut().position(|c| c.slug == attr.slug) {
                Some(pos) => &mut choices[pos],
                None => {
                    choices.push(AttributeChoice {
                        name: attr.name.clone(),
                        slug: attr.slug.clone(),
                        values: vec![],
                    });
                    let last = choices.len() - 1;
                    &mut choices[last]
                }
            };
            match choice.values.iter_mut().find(|v| v.value == attr.value) {
                Some(existing) if display > existing.display => {
                    existing.display = display;
                    existing.variant_id = variant_id;
                }
                Some(_) => {}
                None => choice.values.push(ChoiceValue {
                    value: attr.value.clone(),
                    unit: attr.unit.clone(),
                    display,
                    variant_id,
                }),
            }
        }
    }
    Some(choices)
}

/// A value the current variant does not hold is reachable when an adjacent
/// attribute of the candidate (previous or next index, no wraparound) holds
/// the current variant's value. Without neighbours the value is reachable.
fn display_of(selected: &[Attribute], candidate: &[Attribute], index: usize) -> ChoiceDisplay {
    let Some(attr) = candidate.get(index) else {
        return ChoiceDisplay::Unreachable;
    };
    if selected.get(index).is_some_and(|s| s.value == attr.value) {
        return ChoiceDisplay::Selected;
    }
    let prev = index.checked_sub(1);
    let next = Some(index + 1).filter(|n| *n < candidate.len());
    let matches_at = |j: usize| {
        selected
            .get(j)
            .is_some_and(|s| s.value == candidate[j].value)
    };
    let reachable = match (prev, next) {
        (None, None) => true,
        (prev, next) => prev.is_some_and(matches_at) || next.is_some_and(matches_at),
    };
    if reachable {
        ChoiceDisplay::Reachable
    } else {
        ChoiceDisplay::Unreachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(values: &[(&str, &str)]) -> Vec<Attribute> {
        values.iter().map(|(n, v)| Attribute::new(*n, *v)).collect()
    }

    fn display(choices: &[AttributeChoice], slug: &str, value: &str) -> ChoiceDisplay {
        choices
            .iter()
            .find(|c| c.slug.as_str() == slug)
            .and_then(|c| c.value(value))
            .map(|v| v.display)
            .unwrap()
    }

    #[test]
    fn single_attribute_values_are_reachable() {
        let mut shirt = Product::complex("Shirt");
        let a = shirt.add_variant("A", attrs(&[("Colour", "A")]), vec![]).unwrap();
        let b = shirt.add_variant("B", attrs(&[("Colour", "B")]), vec![]).unwrap();
        let c = shirt.add_variant("C", attrs(&[("Colour", "C")]), vec![]).unwrap();

        let choices = resolve_choices(&shirt, Some(&b)).unwrap();
        assert_eq!(1, choices.len());
        assert_eq!(ChoiceDisplay::Selected, display(&choices, "colour", "B"));
        assert_eq!(ChoiceDisplay::Reachable, display(&choices, "colour", "A"));
        assert_eq!(ChoiceDisplay::Reachable, display(&choices, "colour", "C"));

        let values = &choices[0].values;
        assert_eq!(vec!["A", "B", "C"], values.iter().map(|v| v.value.as_str()).collect::<Vec<_>>());
        assert_eq!(Some(a), values[0].variant_id);
        assert_eq!(None, values[1].variant_id);
        assert_eq!(Some(c), values[2].variant_id);
    }

    #[test]
    fn combination_without_sibling_is_unreachable() {
        let mut shirt = Product::complex("Shirt");
        let red_s = shirt
            .add_variant("Red S", attrs(&[("Colour", "Red"), ("Size", "S")]), vec![])
            .unwrap();
        shirt.add_variant("Blue M", attrs(&[("Colour", "Blue"), ("Size", "M")]), vec![]);
        shirt.add_variant("Red M", attrs(&[("Colour", "Red"), ("Size", "M")]), vec![]);

        let choices = resolve_choices(&shirt, Some(&red_s)).unwrap();
        assert_eq!(ChoiceDisplay::Selected, display(&choices, "colour", "Red"));
        assert_eq!(ChoiceDisplay::Selected, display(&choices, "size", "S"));
        // Blue only exists together with M
        assert_eq!(ChoiceDisplay::Unreachable, display(&choices, "colour", "Blue"));
        // Red M differs from Red S by size only
        assert_eq!(ChoiceDisplay::Reachable, display(&choices, "size", "M"));
    }

    #[test]
    fn strongest_state_wins() {
        let mut shirt = Product::complex("Shirt");
        shirt.add_variant("Blue M", attrs(&[("Colour", "Blue"), ("Size", "M")]), vec![]);
        let red_s = shirt
            .add_variant("Red S", attrs(&[("Colour", "Red"), ("Size", "S")]), vec![])
            .unwrap();
        let blue_s = shirt
            .add_variant("Blue S", attrs(&[("Colour", "Blue"), ("Size", "S")]), vec![])
            .unwrap();

        let choices = resolve_choices(&shirt, Some(&red_s)).unwrap();
        let blue = choices[0].value("Blue").unwrap();
        assert_eq!(ChoiceDisplay::Reachable, blue.display);
        assert_eq!(Some(blue_s), blue.variant_id);
    }

    #[test]
    fn uses_default_variant() {
        let mut shirt = Product::complex("Shirt");
        shirt.add_variant("S", attrs(&[("Size", "S")]), vec![]);
        let m = shirt.add_variant("M", attrs(&[("Size", "M")]), vec![]).unwrap();
        shirt.set_default_variant(&m);
        let choices = resolve_choices(&shirt, None).unwrap();
        assert_eq!(ChoiceDisplay::Selected, display(&choices, "size", "M"));
        assert_eq!(ChoiceDisplay::Reachable, display(&choices, "size", "S"));
    }

    #[test]
    fn missing_index_never_matches() {
        let mut shirt = Product::complex("Shirt");
        let short = shirt.add_variant("S", attrs(&[("Size", "S")]), vec![]).unwrap();
        shirt.add_variant("M Red", attrs(&[("Size", "M"), ("Colour", "Red")]), vec![]);
        shirt.add_variant("S Blue", attrs(&[("Size", "S"), ("Colour", "Blue")]), vec![]);
        let choices = resolve_choices(&shirt, Some(&short)).unwrap();
        assert_eq!(ChoiceDisplay::Unreachable, display(&choices, "size", "M"));
        assert_eq!(ChoiceDisplay::Unreachable, display(&choices, "colour", "Red"));
        // previous index holds the current size
        assert_eq!(ChoiceDisplay::Reachable, display(&choices, "colour", "Blue"));
    }

    #[test]
    fn adjacent_attribute_decides_reachability() {
        let mut shirt = Product::complex("Shirt");
        let current = shirt
            .add_variant(
                "Red S Cotton",
                attrs(&[("Colour", "Red"), ("Size", "S"), ("Fabric", "Cotton")]),
                vec![],
            )
            .unwrap();
        let blue = shirt
            .add_variant(
                "Blue S Wool",
                attrs(&[("Colour", "Blue"), ("Size", "S"), ("Fabric", "Wool")]),
                vec![],
            )
            .unwrap();
        shirt.add_variant(
            "Red M Linen",
            attrs(&[("Colour", "Red"), ("Size", "M"), ("Fabric", "Linen")]),
            vec![],
        );
        shirt.add_variant(
            "Green L Silk",
            attrs(&[("Colour", "Green"), ("Size", "L"), ("Fabric", "Silk")]),
            vec![],
        );

        let choices = resolve_choices(&shirt, Some(&current)).unwrap();
        let blue_choice = choices[0].value("Blue").unwrap();
        assert_eq!(ChoiceDisplay::Reachable, blue_choice.display);
        assert_eq!(Some(blue), blue_choice.variant_id);
        assert_eq!(ChoiceDisplay::Reachable, display(&choices, "fabric", "Wool"));
        // middle index: the previous neighbour matches
        assert_eq!(ChoiceDisplay::Reachable, display(&choices, "size", "M"));
        // last index: only the previous neighbour counts
        assert_eq!(ChoiceDisplay::Unreachable, display(&choices, "fabric", "Linen"));
        assert_eq!(ChoiceDisplay::Unreachable, display(&choices, "colour", "Green"));
        assert_eq!(ChoiceDisplay::Unreachable, display(&choices, "size", "L"));
    }

    #[test]
    fn returns_none_without_variants_or_attributes() {
        assert!(resolve_choices(&Product::simple("Phone", vec![]), None).is_none());
        let mut shirt = Product::complex("Shirt");
        assert!(resolve_choices(&shirt, None).is_none());
        shirt.add_variant("Plain", vec![], vec![]);
        assert!(resolve_choices(&shirt, None).is_none());
    }
}
