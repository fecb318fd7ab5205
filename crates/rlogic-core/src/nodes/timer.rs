//! Timer nodes: expose a microsecond ticker.
//!
//! When the `ticker_us` input is left at zero the engine clock is used,
//! otherwise the input is passed through so the host can drive time itself.

use crate::collab::Clock;
use crate::property::{PropertySemantics, PropertySpec, PropertyTree};
use crate::value::{PropertyType, PropertyValue};

pub(crate) fn build_tree() -> Result<PropertyTree, String> {
    let ticker = || PropertySpec::structure("", vec![PropertySpec::leaf("ticker_us", PropertyType::Int64)]);
    PropertyTree::new(&ticker(), Some(&ticker()), PropertySemantics::Input)
}

pub(crate) fn execute(tree: &mut PropertyTree, clock: &dyn Clock) -> Result<(), String> {
    let input = tree
        .resolve_path(tree.inputs(), "ticker_us")
        .and_then(|idx| tree.value(idx))
        .and_then(|v| v.get::<i64>())
        .unwrap_or_default();
    let ticker = if input == 0 { clock.now_us() } else { input };
    let output = tree
        .outputs()
        .and_then(|root| tree.resolve_path(root, "ticker_us"))
        .ok_or("Timer node has no ticker output")?;
    tree.set_leaf(output, PropertyValue::Int64(ticker));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(i64);

    impl Clock for Fixed {
        fn now_us(&self) -> i64 {
            self.0
        }
    }

    fn ticker(tree: &PropertyTree) -> Option<i64> {
        let idx = tree.resolve_path(tree.outputs().unwrap(), "ticker_us").unwrap();
        tree.value(idx).and_then(|v| v.get::<i64>())
    }

    #[test]
    fn zero_input_uses_clock() {
        let mut tree = build_tree().unwrap();
        execute(&mut tree, &Fixed(1234)).unwrap();
        assert_eq!(ticker(&tree), Some(1234));
    }

    #[test]
    fn user_ticker_passes_through() {
        let mut tree = build_tree().unwrap();
        let input = tree.resolve_path(tree.inputs(), "ticker_us").unwrap();
        tree.set_leaf(input, PropertyValue::Int64(77));
        execute(&mut tree, &Fixed(1234)).unwrap();
        assert_eq!(ticker(&tree), Some(77));
    }
}
