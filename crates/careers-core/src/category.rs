//! Mapping from Wikidata career classes to [`Category`].
//!
//! Only the base classes carry an explicit category. Every transitive subclass
//! discovered through them maps to [`Category::Profession`].

use crate::career::Category;

/// The five classes career discovery starts from when no class cache exists:
/// profession, occupation, job, position, and the newer position class.
pub const BASE_CLASSES: [&str; 5] = ["Q28640", "Q12737077", "Q192581", "Q4164871", "Q136649946"];

const BASE_CATEGORIES: [(&str, Category); 5] = [
  ("Q28640", Category::Profession),
  ("Q12737077", Category::Occupation),
  ("Q192581", Category::Job),
  ("Q4164871", Category::Position),
  ("Q136649946", Category::Position),
];

/// Category for an entity discovered as an instance of `class_id`.
pub fn category_for_class(class_id: &str) -> Category {
  BASE_CATEGORIES
    .iter()
    .find_map(|&(id, category)| (id == class_id).then_some(category))
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn base_classes_map_explicitly() {
    assert_eq!(category_for_class("Q28640"), Category::Profession);
    assert_eq!(category_for_class("Q12737077"), Category::Occupation);
    assert_eq!(category_for_class("Q192581"), Category::Job);
    assert_eq!(category_for_class("Q4164871"), Category::Position);
    assert_eq!(category_for_class("Q136649946"), Category::Position);
  }

  #[test]
  fn unknown_classes_default_to_profession() {
    assert_eq!(category_for_class("Q999999"), Category::Profession);
    assert_eq!(category_for_class(""), Category::Profession);
  }

  #[test]
  fn every_base_class_has_a_mapping() {
    for class in BASE_CLASSES {
      assert!(BASE_CATEGORIES.iter().any(|(id, _)| *id == class));
    }
  }
}
