//! Opt-in elastic relaxation of market constraints.
//!
//! An infeasible case (demand beyond deliverable supply, an unmeetable FCAS
//! requirement) normally fails the whole solve. With deficit mode enabled,
//! every market equality gains a penalized deficit variable (+1, covers a
//! shortfall) and surplus variable (-1, absorbs an excess) so the solve
//! stays feasible and the violation is visible in the results instead.
//!
//! Runs after the other builders over their merged output, scanning for
//! market-keyed rows.

use spot_core::{
    Bounds, BuilderOutput, DecisionVariable, IdRegistry, MarketKey, VarTag, VariableId,
};
use tracing::warn;

use crate::config::EngineConfig;

/// Attach deficit/surplus variables to every market constraint in `merged`.
/// No-op unless `config.allow_deficit` is set.
pub fn relax(merged: &mut BuilderOutput, config: &EngineConfig, registry: &mut IdRegistry) {
    if !config.allow_deficit {
        return;
    }
    warn!(
        penalty = config.deficit_penalty,
        "market constraints relaxed; violations will clear at the penalty price"
    );

    let mut additions = Vec::new();
    for constraint in merged.constraints.iter().filter(|c| c.is_market()) {
        let label = key_label(&constraint.markets[0]);

        let deficit = VariableId::new(registry.next_id());
        additions.push((
            DecisionVariable::continuous(
                deficit,
                Bounds::non_negative(f64::INFINITY),
                VarTag::Deficit {
                    constraint: format!("deficit/{label}"),
                },
            )
            .with_objective(config.deficit_penalty),
            constraint.id,
            1.0,
        ));

        let surplus = VariableId::new(registry.next_id());
        additions.push((
            DecisionVariable::continuous(
                surplus,
                Bounds::non_negative(f64::INFINITY),
                VarTag::Deficit {
                    constraint: format!("surplus/{label}"),
                },
            )
            .with_objective(config.deficit_penalty),
            constraint.id,
            -1.0,
        ));
    }

    for (var, cid, coefficient) in additions {
        let id = var.id;
        merged.push_variable(var);
        merged.push_coefficient(id, cid, coefficient);
    }
}

fn key_label(key: &MarketKey) -> String {
    format!("{}/{}/{}", key.region, key.service, key.interval)
}
