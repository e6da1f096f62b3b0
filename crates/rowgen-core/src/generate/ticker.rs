//! # Tick Coordinator
//!
//! Wires `tickerFor` declarations into a mixed-radix counter. A sequence
//! that names a tick target stops being the only moving part of its column
//! pair: every time it wraps (its counter reaches `maxTick` with reset
//! enabled), the target advances exactly one tick, and the wrap cascades up
//! the chain the way an odometer carries. The chained sequences together
//! enumerate every combination of their values exactly once per full cycle,
//! which is what makes composite primary keys unique without a seen-set.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Result, RowGenError};
use crate::generate::generator::Generator;

#[derive(Debug)]
pub struct TickCoordinator {
    /// Subordinate index to ticker (target) index.
    tickers: HashMap<usize, usize>,
    /// Reverse direction: ticker index to the subordinate that ticks it.
    ticked_by: HashMap<usize, usize>,
    /// Chain tails: subordinates that self-advance (no one ticks them).
    tails: Vec<usize>,
}

impl TickCoordinator {
    /// Validate every `tickerFor` declaration and mark the targets as
    /// externally ticked. `index` maps column names to generator slots.
    pub fn build(
        generators: &mut [Generator],
        index: &HashMap<String, usize>,
    ) -> Result<Self> {
        let mut tickers: HashMap<usize, usize> = HashMap::new();
        let mut ticked_by: HashMap<usize, usize> = HashMap::new();
        for slot in 0..generators.len() {
            let Some(sequence) = generators[slot].as_sequence() else {
                continue;
            };
            let Some(target_name) = sequence.ticker_for() else {
                continue;
            };
            if sequence.max_tick() == u64::MAX {
                return Err(RowGenError::config(
                    sequence.column(),
                    "a sequence with a 'tickerFor' target needs a finite 'maxTick'",
                ));
            }
            if !sequence.wraps() {
                return Err(RowGenError::config(
                    sequence.column(),
                    "a sequence with a 'tickerFor' target needs 'reset' enabled",
                ));
            }
            let target = *index.get(target_name).ok_or_else(|| {
                RowGenError::config(
                    sequence.column(),
                    format!("the 'tickerFor' target '{}' is not a generated column", target_name),
                )
            })?;
            if generators[target].as_sequence().is_none() {
                return Err(RowGenError::config(
                    generators[slot].column(),
                    format!(
                        "the 'tickerFor' target '{}' is a {} generator; only sequences can be ticked",
                        target_name,
                        generators[target].kind()
                    ),
                ));
            }
            if let Some(&other) = ticked_by.get(&target) {
                return Err(RowGenError::config(
                    generators[slot].column(),
                    format!(
                        "the column '{}' is already ticked by '{}'; tick relationships form a simple chain",
                        target_name,
                        generators[other].column()
                    ),
                ));
            }
            ticked_by.insert(target, slot);
            tickers.insert(slot, target);
        }
        for &target in tickers.values() {
            if let Some(sequence) = generators[target].as_sequence_mut() {
                sequence.set_ticked_externally();
            }
        }
        let tails: Vec<usize> = tickers
            .keys()
            .filter(|slot| !ticked_by.contains_key(slot))
            .copied()
            .collect();
        if !tickers.is_empty() {
            debug!(links = tickers.len(), tails = tails.len(), "tick chains wired");
        }
        Ok(Self {
            tickers,
            ticked_by,
            tails,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// The product of `counts` over the whole chain `slot` belongs to, or
    /// `None` when the slot is not chained. Every chain member shares the
    /// same composite capacity: the subordinate enumerates its full range
    /// once per ticker value.
    pub fn chain_product(&self, slot: usize, counts: &[u64]) -> Option<u64> {
        if !self.tickers.contains_key(&slot) && !self.ticked_by.contains_key(&slot) {
            return None;
        }
        // Walk down to the chain tail, then multiply upward.
        let mut tail = slot;
        while let Some(&sub) = self.ticked_by.get(&tail) {
            tail = sub;
        }
        let mut product = counts[tail];
        let mut cur = tail;
        while let Some(&target) = self.tickers.get(&cur) {
            product = product.saturating_mul(counts[target]);
            cur = target;
        }
        Some(product)
    }

    /// Carry pending rollovers up their chains. Called once after each
    /// produced row, so a ticker's new value is first visible in the next
    /// row.
    pub fn propagate(&self, generators: &mut [Generator]) {
        for &tail in &self.tails {
            let rolled = generators[tail]
                .as_sequence_mut()
                .map(|s| s.take_rollover())
                .unwrap_or(false);
            if !rolled {
                continue;
            }
            let mut slot = tail;
            while let Some(&target) = self.tickers.get(&slot) {
                let wrapped = generators[target]
                    .as_sequence_mut()
                    .map(|s| s.tick())
                    .unwrap_or(false);
                if !wrapped {
                    break;
                }
                slot = target;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnSpec;
    use crate::generate::providers::Collaborators;
    use crate::schema::types::{ColumnMeta, ScalarType};

    fn sequence(name: &str, spec: ColumnSpec) -> Generator {
        let meta = ColumnMeta::new(name, ScalarType::Int);
        Generator::from_spec(&meta, &spec, &Collaborators::new()).unwrap()
    }

    fn draw(generators: &mut [Generator], slot: usize) -> i64 {
        generators[slot]
            .as_sequence_mut()
            .unwrap()
            .next()
            .unwrap()
            .as_int()
            .unwrap()
    }

    #[test]
    fn test_two_level_odometer_enumerates_all_pairs() {
        let mut generators = vec![
            sequence("order_id", ColumnSpec::sequence().with_max_tick(2)),
            sequence(
                "line_no",
                ColumnSpec::sequence()
                    .with_max_tick(3)
                    .with_reset(true)
                    .with_ticker_for("order_id"),
            ),
        ];
        let index = HashMap::from([("order_id".to_string(), 0), ("line_no".to_string(), 1)]);
        let coordinator = TickCoordinator::build(&mut generators, &index).unwrap();
        assert!(!coordinator.is_empty());

        let mut pairs = Vec::new();
        for _ in 0..6 {
            let order = draw(&mut generators, 0);
            let line = draw(&mut generators, 1);
            pairs.push((order, line));
            coordinator.propagate(&mut generators);
        }
        assert_eq!(
            pairs,
            vec![(1, 1), (1, 2), (1, 3), (2, 1), (2, 2), (2, 3)]
        );
        // The head has no reset: the composite key space is exhausted.
        assert!(generators[0].as_sequence_mut().unwrap().next().is_err());
    }

    #[test]
    fn test_three_level_chain_carries_like_an_odometer() {
        let mut generators = vec![
            sequence("a", ColumnSpec::sequence().with_max_tick(2).with_reset(true)),
            sequence(
                "b",
                ColumnSpec::sequence()
                    .with_max_tick(2)
                    .with_reset(true)
                    .with_ticker_for("a"),
            ),
            sequence(
                "c",
                ColumnSpec::sequence()
                    .with_max_tick(2)
                    .with_reset(true)
                    .with_ticker_for("b"),
            ),
        ];
        let index = HashMap::from([
            ("a".to_string(), 0),
            ("b".to_string(), 1),
            ("c".to_string(), 2),
        ]);
        let coordinator = TickCoordinator::build(&mut generators, &index).unwrap();

        let mut triples = Vec::new();
        for _ in 0..8 {
            let triple = (
                draw(&mut generators, 0),
                draw(&mut generators, 1),
                draw(&mut generators, 2),
            );
            triples.push(triple);
            coordinator.propagate(&mut generators);
        }
        // All 8 combinations, subordinate fastest.
        assert_eq!(triples.len(), 8);
        let mut sorted = triples.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 8);
        assert_eq!(triples[0], (1, 1, 1));
        assert_eq!(triples[1], (1, 1, 2));
        assert_eq!(triples[2], (1, 2, 1));
    }

    #[test]
    fn test_ticker_target_must_wrap() {
        let mut generators = vec![
            sequence("a", ColumnSpec::sequence()),
            sequence(
                "b",
                ColumnSpec::sequence().with_max_tick(3).with_ticker_for("a"),
            ),
        ];
        let index = HashMap::from([("a".to_string(), 0), ("b".to_string(), 1)]);
        // reset missing on the subordinate
        assert!(TickCoordinator::build(&mut generators, &index).is_err());
    }

    #[test]
    fn test_double_ticking_one_target_rejected() {
        let chain = |name: &str| {
            sequence(
                name,
                ColumnSpec::sequence()
                    .with_max_tick(2)
                    .with_reset(true)
                    .with_ticker_for("a"),
            )
        };
        let mut generators = vec![sequence("a", ColumnSpec::sequence()), chain("b"), chain("c")];
        let index = HashMap::from([
            ("a".to_string(), 0),
            ("b".to_string(), 1),
            ("c".to_string(), 2),
        ]);
        let err = TickCoordinator::build(&mut generators, &index).unwrap_err();
        assert!(matches!(err, RowGenError::Configuration { .. }));
    }

    #[test]
    fn test_unknown_target_rejected() {
        let mut generators = vec![sequence(
            "b",
            ColumnSpec::sequence()
                .with_max_tick(2)
                .with_reset(true)
                .with_ticker_for("ghost"),
        )];
        let index = HashMap::from([("b".to_string(), 0)]);
        assert!(TickCoordinator::build(&mut generators, &index).is_err());
    }

    #[test]
    fn test_externally_ticked_values_repeat_within_a_cycle() {
        let mut generators = vec![
            sequence("order_id", ColumnSpec::sequence().with_max_tick(5)),
            sequence(
                "line_no",
                ColumnSpec::sequence()
                    .with_max_tick(2)
                    .with_reset(true)
                    .with_ticker_for("order_id"),
            ),
        ];
        let index = HashMap::from([("order_id".to_string(), 0), ("line_no".to_string(), 1)]);
        let coordinator = TickCoordinator::build(&mut generators, &index).unwrap();
        let mut orders = Vec::new();
        for _ in 0..4 {
            orders.push(draw(&mut generators, 0));
            let _ = draw(&mut generators, 1);
            coordinator.propagate(&mut generators);
        }
        assert_eq!(orders, vec![1, 1, 2, 2]);
    }
}
