//! A single call session: members in arrival order. The registry keys it by id.

use crate::participant::ParticipantId;

#[derive(Debug, Clone, Default)]
pub(crate) struct Session {
    members: Vec<ParticipantId>,
}

impl Session {

    /// Members in arrival order; the first is the initiator by client convention.
    pub fn members(&self) -> &[ParticipantId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.members.contains(participant)
    }

    /// Every member except `excluded`.
    pub fn others<'a>(
        &'a self,
        excluded: &'a ParticipantId,
    ) -> impl Iterator<Item = &'a ParticipantId> + 'a {
        self.members.iter().filter(move |m| *m != excluded)
    }

    pub(crate) fn add(&mut self, participant: ParticipantId) {
        if !self.contains(&participant) {
            self.members.push(participant);
        }
    }

    /// Remove `participant`; returns whether it was a member.
    pub(crate) fn remove(&mut self, participant: &ParticipantId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != participant);
        self.members.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn others_excludes_only_the_given_member() {
        let mut s = Session::default();
        let a = ParticipantId::from("p-a");
        let b = ParticipantId::from("p-b");
        s.add(a.clone());
        s.add(b.clone());
        assert_eq!(s.others(&a).cloned().collect::<Vec<_>>(), vec![b.clone()]);
        assert_eq!(s.others(&b).cloned().collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn add_is_idempotent_and_remove_reports_membership() {
        let mut s = Session::default();
        let a = ParticipantId::from("p-a");
        s.add(a.clone());
        s.add(a.clone());
        assert_eq!(s.len(), 1);
        assert!(s.remove(&a));
        assert!(!s.remove(&a));
        assert!(s.is_empty());
    }
}
