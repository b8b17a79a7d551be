//! Rendering of join sequences into FROM/WHERE text.

use crate::from::{JoinSequence, RenderedFragment};

/// Dialect seam: turns a join sequence into FROM and WHERE fragments.
///
/// The post-processor treats the result as opaque text.
pub trait FragmentRenderer: Send + Sync {
    /// Render `sequence`; outer-join steps are dropped unless
    /// `include_outer_joins` is set.
    fn render(&self, sequence: &JoinSequence, include_outer_joins: bool) -> RenderedFragment;
}

/// ANSI `join .. on ..` syntax; theta-style sequences render a comma list
/// with their conditions in the WHERE fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiFragmentRenderer;

impl FragmentRenderer for AnsiFragmentRenderer {
    fn render(&self, sequence: &JoinSequence, include_outer_joins: bool) -> RenderedFragment {
        let mut from = String::new();
        let mut conditions: Vec<String> = Vec::new();

        if let Some(root) = &sequence.root {
            from.push_str(&format!("{} {}", root.table, root.alias));
        }
        for step in &sequence.steps {
            if step.kind.is_outer() && !include_outer_joins {
                continue;
            }
            let on = step.condition_texts();
            if sequence.is_theta_style() && !step.hierarchy {
                if !from.is_empty() {
                    from.push_str(", ");
                }
                from.push_str(&format!("{} {}", step.table, step.alias));
                conditions.extend(on);
            } else {
                if !from.is_empty() {
                    from.push(' ');
                }
                from.push_str(&format!(
                    "{} {} {} on {}",
                    step.kind.keyword(),
                    step.table,
                    step.alias,
                    on.join(" and ")
                ));
            }
        }
        conditions.extend(sequence.restrictions.iter().cloned());

        RenderedFragment {
            from_text: from,
            where_text: conditions.join(" and "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::from::{column_pairs, JoinStep};
    use ormql_proto::JoinKind;
    use pretty_assertions::assert_eq;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn many_to_many() -> JoinSequence {
        let mut sequence = JoinSequence::new();
        sequence
            .add_step(JoinStep::new(
                "order_product",
                "products1_",
                JoinKind::Inner,
                column_pairs("order0_", &cols(&["id"]), "products1_", &cols(&["order_id"])),
            ))
            .add_step(JoinStep::new(
                "product",
                "product2_",
                JoinKind::Inner,
                column_pairs("products1_", &cols(&["product_id"]), "product2_", &cols(&["id"])),
            ));
        sequence
    }

    #[test]
    fn test_ansi_rendering() {
        let rendered = AnsiFragmentRenderer.render(&many_to_many(), true);
        assert_eq!(
            rendered.from_text,
            "inner join order_product products1_ on order0_.id=products1_.order_id \
             inner join product product2_ on products1_.product_id=product2_.id"
        );
        assert_eq!(rendered.where_text, "");
    }

    #[test]
    fn test_theta_rendering() {
        let mut sequence = many_to_many();
        sequence.set_theta_style(true);
        let rendered = AnsiFragmentRenderer.render(&sequence, true);
        assert_eq!(rendered.from_text, "order_product products1_, product product2_");
        assert_eq!(
            rendered.where_text,
            "order0_.id=products1_.order_id and products1_.product_id=product2_.id"
        );
    }

    #[test]
    fn test_root_with_restrictions_and_outer_steps() {
        let mut sequence = JoinSequence::rooted("animal", "cat0_");
        sequence.add_restriction("cat0_.type = 'CAT'");
        sequence.add_step(
            JoinStep::new(
                "lion",
                "cat0_1_",
                JoinKind::LeftOuter,
                column_pairs("cat0_", &cols(&["id"]), "cat0_1_", &cols(&["id"])),
            )
            .within_hierarchy(),
        );

        let rendered = AnsiFragmentRenderer.render(&sequence, true);
        assert_eq!(
            rendered.from_text,
            "animal cat0_ left outer join lion cat0_1_ on cat0_.id=cat0_1_.id"
        );
        assert_eq!(rendered.where_text, "cat0_.type = 'CAT'");

        let without_outer = AnsiFragmentRenderer.render(&sequence, false);
        assert_eq!(without_outer.from_text, "animal cat0_");
    }
}
