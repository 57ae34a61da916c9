/// Connection state reported by a session's event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    Disconnected,
    Expired,
    Unknown,
}

impl SessionState {
    /// States after which the session can no longer be trusted and must be
    /// replaced.
    pub fn is_lost(&self) -> bool {
        matches!(
            self,
            SessionState::Disconnected | SessionState::Expired | SessionState::Unknown
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEvent {
    pub state: SessionState,
}

impl SessionEvent {
    pub fn new(state: SessionState) -> Self {
        Self { state }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEventKind {
    DataChanged,
    Created,
    Deleted,
    ChildrenChanged,
    NotWatching,
}

impl NodeEventKind {
    /// Events that change the content of the watched node itself.
    pub fn is_data_event(&self) -> bool {
        matches!(
            self,
            NodeEventKind::DataChanged | NodeEventKind::Created | NodeEventKind::Deleted
        )
    }
}

/// Payload of a fired one-shot watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEvent {
    pub kind: NodeEventKind,
    pub path: String,
}

impl NodeEvent {
    pub fn new(
        kind: NodeEventKind,
        path: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}
