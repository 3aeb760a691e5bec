/// Ownership ledger: pantry items, grocery items and meal plans
///
/// Every resource carries the id of the account that created it. Single
/// resource reads and writes go through [`require_owned`], which loads the
/// resource and compares owners before anything is applied.
pub mod grocery;
pub mod meals;
pub mod pantry;

pub use grocery::{GroceryItem, GroceryStore};
pub use meals::{MealPlan, MealStore};
pub use pantry::{PantryItem, PantryStore};

use crate::error::{PantryError, PantryResult};
use async_trait::async_trait;

/// A resource tagged with its owning account
pub trait Owned {
    fn owner_id(&self) -> &str;
}

/// Store that can load owned resources by id
#[async_trait]
pub trait OwnedStore: Send + Sync {
    type Resource: Owned + Send;

    /// Noun used in not-found messages
    const LABEL: &'static str;

    async fn find_by_id(&self, id: &str) -> PantryResult<Option<Self::Resource>>;
}

/// Load a resource and check that the requester owns it.
///
/// Absent resources are `NotFound`; resources owned by someone else are
/// `Forbidden`, never masked as not found.
pub async fn require_owned<S>(store: &S, id: &str, requester: &str) -> PantryResult<S::Resource>
where
    S: OwnedStore + ?Sized,
{
    let resource = store
        .find_by_id(id)
        .await?
        .ok_or_else(|| PantryError::NotFound(format!("{} not found", S::LABEL)))?;

    if resource.owner_id() != requester {
        tracing::warn!(resource_id = id, requester, "Ownership check failed");
        return Err(PantryError::Forbidden(format!(
            "{} belongs to another account",
            S::LABEL
        )));
    }

    Ok(resource)
}

/// Defines a string-backed enum stored as TEXT and serialized in lowercase
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($label:literal) {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            pub fn parse(s: &str) -> $crate::error::PantryResult<Self> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err($crate::error::PantryError::Validation(format!(
                        "Invalid {}: {}",
                        $label, s
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use text_enum;

text_enum! {
    /// Food category shared by pantry and grocery items
    pub enum Category ("category") {
        Grains => "grains",
        Dairy => "dairy",
        Vegetables => "vegetables",
        Fruits => "fruits",
        Meat => "meat",
        Spices => "spices",
        Snacks => "snacks",
        Beverages => "beverages",
        Other => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Note {
        owner: String,
    }

    impl Owned for Note {
        fn owner_id(&self) -> &str {
            &self.owner
        }
    }

    struct NoteStore(HashMap<String, String>);

    #[async_trait]
    impl OwnedStore for NoteStore {
        type Resource = Note;
        const LABEL: &'static str = "Note";

        async fn find_by_id(&self, id: &str) -> PantryResult<Option<Note>> {
            Ok(self.0.get(id).map(|owner| Note {
                owner: owner.clone(),
            }))
        }
    }

    fn store() -> NoteStore {
        NoteStore(HashMap::from([("n1".to_string(), "alice".to_string())]))
    }

    #[tokio::test]
    async fn test_owner_passes() {
        let note = require_owned(&store(), "n1", "alice").await.unwrap();
        assert_eq!(note.owner, "alice");
    }

    #[tokio::test]
    async fn test_other_account_is_forbidden() {
        assert!(matches!(
            require_owned(&store(), "n1", "bob").await,
            Err(PantryError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_is_not_found() {
        match require_owned(&store(), "n2", "alice").await {
            Err(PantryError::NotFound(msg)) => assert_eq!(msg, "Note not found"),
            _ => panic!("expected not found"),
        }
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!(Category::parse("Dairy").unwrap(), Category::Dairy);
        assert_eq!(Category::Spices.to_string(), "spices");
        assert!(Category::parse("candy").is_err());
        assert_eq!(
            serde_json::to_value(Category::Beverages).unwrap(),
            serde_json::json!("beverages")
        );
    }
}
