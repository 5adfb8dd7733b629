//! Retrieved items

/// A value returned by a retrieval command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Raw value bytes
    pub value: Vec<u8>,

    /// Opaque flags stored alongside the value
    pub flags: u32,

    /// Version token, only present for `gets`
    pub cas: Option<u64>,
}

impl Item {
    pub fn new(value: Vec<u8>, flags: u32, cas: Option<u64>) -> Self {
        Self { value, flags, cas }
    }

    /// Value length in bytes
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Consume the item and return its value
    pub fn into_value(self) -> Vec<u8> {
        self.value
    }
}
