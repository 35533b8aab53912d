//! Online voice clients of one session.

use std::collections::BTreeMap;
use voxfleet_proto::ClientRecord;

/// Remote client id -> last known record. Only real voice clients are kept.
#[derive(Debug, Default)]
pub struct OnlineClientSet {
    clients: BTreeMap<u64, ClientRecord>,
}

impl OnlineClientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set with the voice clients among `records`.
    pub fn replace(&mut self, records: impl IntoIterator<Item = ClientRecord>) {
        self.clients = records
            .into_iter()
            .filter(ClientRecord::is_voice)
            .map(|r| (r.clid, r))
            .collect();
    }

    /// Record a client coming online. Returns `true` on first sight only.
    pub fn enter(&mut self, record: ClientRecord) -> bool {
        if !record.is_voice() || self.clients.contains_key(&record.clid) {
            return false;
        }
        self.clients.insert(record.clid, record);
        true
    }

    /// Forget a client. Returns its last known record if it was online.
    pub fn leave(&mut self, clid: u64) -> Option<ClientRecord> {
        self.clients.remove(&clid)
    }

    /// Current members ordered by client id.
    pub fn snapshot(&self) -> Vec<ClientRecord> {
        self.clients.values().cloned().collect()
    }

    pub fn contains(&self, clid: u64) -> bool {
        self.clients.contains_key(&clid)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(clid: u64, kind: u8) -> ClientRecord {
        ClientRecord::from_row(&json!({
            "clid": clid,
            "client_nickname": format!("c{clid}"),
            "client_type": kind
        }))
        .unwrap()
    }

    #[test]
    fn duplicate_enter_is_a_no_op() {
        let mut set = OnlineClientSet::new();
        assert!(set.enter(client(5, 0)));
        assert!(!set.enter(client(5, 0)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn query_clients_never_enter() {
        let mut set = OnlineClientSet::new();
        assert!(!set.enter(client(1, 1)));
        set.replace(vec![client(1, 1), client(2, 0)]);
        assert_eq!(set.snapshot().iter().map(|c| c.clid).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn leave_returns_last_known_record() {
        let mut set = OnlineClientSet::new();
        set.enter(client(3, 0));
        assert_eq!(set.leave(3).map(|c| c.nickname), Some("c3".to_string()));
        assert!(set.leave(3).is_none());
        assert!(set.is_empty());
    }
}
