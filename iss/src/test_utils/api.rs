use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::api::PositionApi;
use crate::bail;
use crate::error::{ErrorKind, IssResult};
use crate::types::Position;

#[derive(Debug)]
struct Inner {
    outcomes: VecDeque<IssResult<Position>>,
    repeat: Option<Position>,
    calls: u32,
}

/// [`PositionApi`] that replays a fixed script of outcomes, one per call.
///
/// Once the script is exhausted every call fails with [`ErrorKind::ApiRequestFailed`],
/// unless the API was built with [`ScriptedPositionApi::repeating`].
#[derive(Debug, Clone)]
pub struct ScriptedPositionApi {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedPositionApi {
    pub fn new(outcomes: Vec<IssResult<Position>>) -> Self {
        Self::build(outcomes.into(), None)
    }

    /// Returns `position` on every call.
    pub fn repeating(position: Position) -> Self {
        Self::build(VecDeque::new(), Some(position))
    }

    fn build(outcomes: VecDeque<IssResult<Position>>, repeat: Option<Position>) -> Self {
        let inner = Inner {
            outcomes,
            repeat,
            calls: 0,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns how many times the API was called.
    pub async fn calls(&self) -> u32 {
        self.inner.lock().await.calls
    }
}

impl PositionApi for ScriptedPositionApi {
    async fn fetch_position(&self) -> IssResult<Position> {
        let mut inner = self.inner.lock().await;
        inner.calls += 1;

        if let Some(outcome) = inner.outcomes.pop_front() {
            return outcome;
        }

        match inner.repeat {
            Some(position) => Ok(position),
            None => bail!(ErrorKind::ApiRequestFailed, "Scripted API ran out of outcomes"),
        }
    }
}
