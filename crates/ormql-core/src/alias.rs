//! Table alias allocation.

use crate::error::{Result, SemanticError};

const ALIAS_TRUNCATE_LENGTH: usize = 10;

/// Issues unique SQL aliases within one compilation.
///
/// Aliases are `root + counter + "_"`, where the root is derived from the
/// entity name, table name or collection role (`com.acme.Order` -> `order0_`).
#[derive(Debug, Default)]
pub struct AliasGenerator {
    next: u32,
}

impl AliasGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh alias for `base`.
    pub fn allocate(&mut self, base: &str) -> Result<String> {
        let unique = self.next;
        self.next = self
            .next
            .checked_add(1)
            .ok_or(SemanticError::AliasSpaceExhausted)?;
        Ok(format!("{}{}_", alias_root(base), unique))
    }

    /// Number of aliases allocated so far.
    pub fn allocated(&self) -> u32 {
        self.next
    }
}

/// Derive the alias root: unqualified, truncated, lower-cased, leading
/// non-letters removed and an `x` appended when it would end in a digit.
pub fn alias_root(description: &str) -> String {
    let unqualified = description.rsplit('.').next().unwrap_or(description);
    let truncated: String = unqualified.chars().take(ALIAS_TRUNCATE_LENGTH).collect();
    let lowered = truncated.to_lowercase().replace(['/', '$'], "_");
    let mut root: String = lowered
        .trim_start_matches(|c: char| !c.is_alphabetic())
        .to_string();
    match root.chars().last() {
        None => root.push('x'),
        Some(c) if c.is_ascii_digit() => root.push('x'),
        Some(_) => {}
    }
    root
}

/// Alias of table `index` in an element's table closure.
///
/// Table 0 uses the element alias itself; others get `<alias><index>_`.
pub fn table_alias(alias: &str, index: usize) -> String {
    if index == 0 {
        alias.to_string()
    } else {
        format!("{}{}_", alias, index)
    }
}
