//! Stable id assignment for extracted declarations

use std::collections::HashMap;

use crate::model::{SymbolId, SymbolKind};

/// Pure id for a declaration: a function of path, qualified name and kind only.
pub fn assign(file_path: &str, qualified_name: &str, kind: SymbolKind) -> SymbolId {
    SymbolId::new(file_path, kind, qualified_name)
}

/// Assigns ids for one file, disambiguating repeated keys in traversal order.
///
/// The first occurrence of a key keeps the bare id; later occurrences get
/// `#1`, `#2`, ... so that adding an overload never renames the original.
#[derive(Debug)]
pub struct IdAssigner {
    file_path: String,
    occurrences: HashMap<SymbolId, u32>,
}

impl IdAssigner {
    pub fn new(file_path: impl Into<String>) -> Self {
        IdAssigner {
            file_path: file_path.into(),
            occurrences: HashMap::new(),
        }
    }

    pub fn assign(&mut self, qualified_name: &str, kind: SymbolKind) -> SymbolId {
        let base = assign(&self.file_path, qualified_name, kind);
        let seen = self.occurrences.entry(base.clone()).or_insert(0);
        let id = if *seen == 0 {
            base
        } else {
            SymbolId(format!("{}#{}", base.0, seen))
        };
        *seen += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_is_pure() {
        let a = assign("Sources/Core/Logic.swift", "Logic.run()", SymbolKind::Method);
        let b = assign("Sources/Core/Logic.swift", "Logic.run()", SymbolKind::Method);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "Sources/Core/Logic.swift::Logic.run()::method");
    }

    #[test]
    fn test_kind_discriminates() {
        let f = assign("a.rs", "thing", SymbolKind::Function);
        let t = assign("a.rs", "thing", SymbolKind::Type);
        assert_ne!(f, t);
    }

    #[test]
    fn test_collisions_get_occurrence_suffix() {
        let mut ids = IdAssigner::new("lib.rs");
        let first = ids.assign("dup", SymbolKind::Function);
        let second = ids.assign("dup", SymbolKind::Function);
        let third = ids.assign("dup", SymbolKind::Function);
        let other = ids.assign("other", SymbolKind::Function);

        assert_eq!(first.as_str(), "lib.rs::dup::function");
        assert_eq!(second.as_str(), "lib.rs::dup::function#1");
        assert_eq!(third.as_str(), "lib.rs::dup::function#2");
        assert_eq!(other.as_str(), "lib.rs::other::function");
    }
}
