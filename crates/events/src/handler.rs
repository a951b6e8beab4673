use groupbuy_core::Aggregate;

/// Execute an aggregate command deterministically (no IO, no async).
///
/// The canonical decide/evolve lifecycle in one step:
///
/// 1. **Decide**: `aggregate.handle(command)` produces events (pure).
/// 2. **Evolve**: each event is applied via `aggregate.apply(event)`.
///
/// The aggregate is mutated in place; its version advances once per applied
/// event. Returns the decided events so the caller can persist and publish
/// them.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: Aggregate,
{
    let events = aggregate.handle(command)?;
    for event in &events {
        aggregate.apply(event);
    }
    Ok(events)
}
