//! Post-commit delivery of lifecycle [`Effect`]s.

use tracing::trace;

use crate::lifecycle::Effect;

use super::AppState;

/// Spawns push deliveries first, then publishes broadcasts. Nothing here can
/// fail the request whose transaction produced the effects.
pub(crate) fn dispatch(state: &AppState, effects: Vec<Effect>) {
    let (pushes, broadcasts): (Vec<_>, Vec<_>) = effects
        .into_iter()
        .partition(|e| matches!(e, Effect::Push { .. }));

    for effect in pushes {
        if let Effect::Push { user_ids, payload } = effect {
            match &state.push {
                Some(push) => push.send_to_users(state.store.clone(), user_ids, payload),
                None => trace!(kind = %payload.kind, "push disabled; dropping notification"),
            }
        }
    }
    for effect in broadcasts {
        if let Effect::Broadcast(event) = effect {
            state.hub.publish(event);
        }
    }
}
