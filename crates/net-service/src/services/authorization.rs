//! Role and authorization checks.
//!
//! Every function here is pure: it inspects state already loaded inside the
//! command's transaction and returns an error before anything is written.
//! Speaking-role decisions go through [`has_speaking_privilege`].

use crate::errors::NetError;
use crate::models::{has_speaking_privilege, Net, Participant, Role};
use common::types::UserId;

/// Reason returned when the speaker cap is hit.
pub const CAPACITY_MESSAGE: &str = "maximum speakers reached; demote someone first";

/// Mutations are only allowed on live nets.
pub fn ensure_live(net: &Net) -> Result<(), NetError> {
    if net.is_live() {
        Ok(())
    } else {
        Err(NetError::InvalidState("Net has ended".to_string()))
    }
}

/// Only the net's fixed host may invite co-hosts.
pub fn ensure_fixed_host(net: &Net, actor_id: UserId) -> Result<(), NetError> {
    if net.host_id == actor_id {
        Ok(())
    } else {
        Err(NetError::Forbidden(
            "Only the net host can invite co-hosts".to_string(),
        ))
    }
}

/// Actor must be an active host or co-host.
pub fn ensure_moderator(actor: Option<&Participant>) -> Result<&Participant, NetError> {
    match actor {
        Some(p) if p.is_active() && p.role.is_moderator() => Ok(p),
        _ => Err(NetError::Forbidden(
            "Only the host or a co-host can manage speakers".to_string(),
        )),
    }
}

/// The fixed host, or any active host/co-host, may end a net.
pub fn ensure_can_end(
    net: &Net,
    actor_id: UserId,
    actor: Option<&Participant>,
) -> Result<(), NetError> {
    if net.host_id == actor_id {
        return Ok(());
    }
    ensure_moderator(actor)
        .map(|_| ())
        .map_err(|_| NetError::Forbidden("Only the host or a co-host can end the net".to_string()))
}

/// Fail if promoting one more participant would exceed `max_speakers`.
pub fn ensure_speaker_capacity(current_speaking: i64, max_speakers: u32) -> Result<(), NetError> {
    if current_speaking < i64::from(max_speakers) {
        Ok(())
    } else {
        Err(NetError::Capacity(CAPACITY_MESSAGE.to_string()))
    }
}

/// Demoting a co-host takes the fixed host; any moderator may demote a speaker.
pub fn ensure_can_demote(net: &Net, actor_id: UserId, target: &Participant) -> Result<(), NetError> {
    match target.role {
        Role::Host => Err(NetError::Forbidden("The host cannot be demoted".to_string())),
        Role::CoHost if net.host_id != actor_id => Err(NetError::Forbidden(
            "Only the net host can demote a co-host".to_string(),
        )),
        Role::Listener => Err(NetError::InvalidState(
            "Participant is already a listener".to_string(),
        )),
        Role::CoHost | Role::Speaker => Ok(()),
    }
}

/// Callers toggle their own mute, and listeners have nothing to toggle.
pub fn ensure_can_toggle_mute(participant: Option<&Participant>) -> Result<&Participant, NetError> {
    let participant = participant
        .filter(|p| p.is_active())
        .ok_or_else(|| NetError::NotFound("Not an active participant in this net".to_string()))?;

    if has_speaking_privilege(participant.role) {
        Ok(participant)
    } else {
        Err(NetError::Forbidden(
            "Listeners cannot toggle mute; request to speak first".to_string(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::NetStatus;
    use chrono::Utc;
    use common::types::NetId;

    fn net(host: i64, status: NetStatus) -> Net {
        Net {
            id: NetId(1),
            name: "Evening net".to_string(),
            description: None,
            host_id: UserId(host),
            status,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    fn participant(user: i64, role: Role, active: bool) -> Participant {
        Participant {
            net_id: NetId(1),
            user_id: UserId(user),
            username: format!("user{user}"),
            role,
            is_muted: role == Role::Listener,
            joined_at: Utc::now(),
            left_at: if active { None } else { Some(Utc::now()) },
        }
    }

    #[test]
    fn test_ended_net_rejects_mutation() {
        assert!(ensure_live(&net(1, NetStatus::Live)).is_ok());
        assert!(matches!(
            ensure_live(&net(1, NetStatus::Ended)),
            Err(NetError::InvalidState(_))
        ));
    }

    #[test]
    fn test_only_fixed_host_invites() {
        let n = net(1, NetStatus::Live);
        assert!(ensure_fixed_host(&n, UserId(1)).is_ok());
        assert!(matches!(
            ensure_fixed_host(&n, UserId(2)),
            Err(NetError::Forbidden(_))
        ));
    }

    #[test]
    fn test_moderator_check() {
        let cohost = participant(2, Role::CoHost, true);
        let speaker = participant(3, Role::Speaker, true);
        let left_host = participant(1, Role::Host, false);

        assert!(ensure_moderator(Some(&cohost)).is_ok());
        assert!(ensure_moderator(Some(&speaker)).is_err());
        assert!(ensure_moderator(Some(&left_host)).is_err());
        assert!(ensure_moderator(None).is_err());
    }

    #[test]
    fn test_end_allowed_for_fixed_host_even_when_absent() {
        let n = net(1, NetStatus::Live);
        assert!(ensure_can_end(&n, UserId(1), None).is_ok());

        let cohost = participant(2, Role::CoHost, true);
        assert!(ensure_can_end(&n, UserId(2), Some(&cohost)).is_ok());

        let listener = participant(3, Role::Listener, true);
        assert!(matches!(
            ensure_can_end(&n, UserId(3), Some(&listener)),
            Err(NetError::Forbidden(_))
        ));
    }

    #[test]
    fn test_speaker_capacity_boundary() {
        assert!(ensure_speaker_capacity(9, 10).is_ok());
        let err = ensure_speaker_capacity(10, 10).unwrap_err();
        assert!(matches!(err, NetError::Capacity(ref m) if m == CAPACITY_MESSAGE));
    }

    #[test]
    fn test_demote_rules() {
        let n = net(1, NetStatus::Live);
        let host = participant(1, Role::Host, true);
        let cohost = participant(2, Role::CoHost, true);
        let speaker = participant(3, Role::Speaker, true);
        let listener = participant(4, Role::Listener, true);

        assert!(matches!(
            ensure_can_demote(&n, UserId(2), &host),
            Err(NetError::Forbidden(_))
        ));
        assert!(ensure_can_demote(&n, UserId(1), &cohost).is_ok());
        assert!(ensure_can_demote(&n, UserId(2), &cohost).is_err());
        assert!(ensure_can_demote(&n, UserId(2), &speaker).is_ok());
        assert!(matches!(
            ensure_can_demote(&n, UserId(1), &listener),
            Err(NetError::InvalidState(_))
        ));
    }

    #[test]
    fn test_toggle_mute_rules() {
        let speaker = participant(3, Role::Speaker, true);
        let listener = participant(4, Role::Listener, true);
        let gone = participant(5, Role::Speaker, false);

        assert!(ensure_can_toggle_mute(Some(&speaker)).is_ok());
        assert!(matches!(
            ensure_can_toggle_mute(Some(&listener)),
            Err(NetError::Forbidden(_))
        ));
        assert!(matches!(
            ensure_can_toggle_mute(Some(&gone)),
            Err(NetError::NotFound(_))
        ));
        assert!(matches!(
            ensure_can_toggle_mute(None),
            Err(NetError::NotFound(_))
        ));
    }
}
