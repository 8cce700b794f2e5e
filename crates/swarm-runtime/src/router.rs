//! C4: recipient resolution built on top of `swarm_common`'s reachability
//! predicate and receiver-side filter.

use swarm_common::{can_reach, should_process, Identity, MessageData};

/// Resolve which of `candidates` should receive a message authored by
/// `from`, per SPEC_FULL §4.4:
///
/// - an explicit `to` narrows to that single recipient (if reachable),
/// - else an explicit `swarm` narrows to that swarm's reachable members,
/// - else every reachable candidate (other than the sender) receives it.
pub fn get_recipients<'a>(
    from: &Identity,
    data: &MessageData,
    candidates: impl IntoIterator<Item = &'a Identity>,
) -> Vec<&'a Identity> {
    let to = data.to();
    let swarm = data.instruct_swarm();

    candidates
        .into_iter()
        .filter(|c| c.name != from.name)
        .filter(|c| can_reach(from, c))
        .filter(|c| match (to, swarm) {
            (Some(target), _) => c.name == target,
            (None, Some(s)) => c.swarm.as_deref() == Some(s),
            (None, None) => true,
        })
        .collect()
}

/// Receiver-side acceptance check for `me`, delegating to
/// `swarm_common::should_process`.
pub fn should_process_message(me: &Identity, data: &MessageData) -> bool {
    should_process(me, Some(data.from()), data.to(), data.instruct_swarm())
}
