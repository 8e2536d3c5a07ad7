use uuid::Uuid;

/// Supplies identifiers unique within the process lifetime.
pub trait IdSupplier {
    fn new_id(&mut self) -> String;
}

/// Random v4 UUIDs in their hyphen-less form.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdSupplier for UuidIds {
    fn new_id(&mut self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Deterministic `{prefix}{n}` identifiers, starting at 1.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        SequentialIds { prefix: prefix.into(), next: 1 }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        SequentialIds::new("id")
    }
}

impl IdSupplier for SequentialIds {
    fn new_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sequential_ids_count_up() {
        let mut ids = SequentialIds::new("t");
        assert_eq!(ids.new_id(), "t1");
        assert_eq!(ids.new_id(), "t2");
    }

    #[test]
    fn uuid_ids_do_not_repeat() {
        let mut ids = UuidIds;
        let seen: HashSet<String> = (0..100).map(|_| ids.new_id()).collect();
        assert_eq!(seen.len(), 100);
    }
}
