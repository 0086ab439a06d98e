use crate::clock::Clock;
use crate::config::Config;
use crate::feed::FeedEvent;
use crate::models::{Definition, MessageRef, PollId, Results, User, UserId};
use crate::poll::{PollData, ResultsReloader, UserLookup};
use chrono::Duration;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("poll {0} is not known to this session")]
    UnknownPoll(PollId),
}

#[derive(Default)]
struct UserRegistry {
    users: HashMap<UserId, Arc<User>>,
}

impl UserLookup for UserRegistry {
    fn user(&self, id: UserId) -> Option<Arc<User>> {
        self.users.get(&id).filter(|user| user.loaded).cloned()
    }
}

/// Owns every poll seen during a session, keyed by id, together with the
/// users they refer to. All mutation goes through here on one thread.
pub struct Session {
    polls: HashMap<PollId, PollData>,
    shown_in: HashMap<PollId, MessageRef>,
    users: UserRegistry,
    clock: Box<dyn Clock>,
    reloader: Box<dyn ResultsReloader>,
    short_poll_timeout: Duration,
}

impl Session {
    pub fn new(
        clock: impl Clock + 'static,
        reloader: impl ResultsReloader + 'static,
        config: &Config,
    ) -> Self {
        Self {
            polls: HashMap::new(),
            shown_in: HashMap::new(),
            users: UserRegistry::default(),
            clock: Box::new(clock),
            reloader: Box::new(reloader),
            short_poll_timeout: config.short_poll_timeout,
        }
    }

    pub fn poll(&self, id: PollId) -> Option<&PollData> {
        self.polls.get(&id)
    }

    pub fn polls(&self) -> impl Iterator<Item = &PollData> {
        self.polls.values()
    }

    pub fn load_user(&mut self, user: User) {
        debug!("Loaded user {} ({})", user.id, user.name);
        self.users.users.insert(user.id, Arc::new(user));
    }

    /// Applies a definition push, creating the poll on first sight.
    pub fn apply_definition(&mut self, definition: &Definition) -> bool {
        let poll = self.polls.entry(definition.id).or_insert_with(|| {
            info!("Tracking new poll {}", definition.id);
            PollData::new(definition.id)
        });
        poll.apply_definition(definition)
    }

    /// Applies a results push. Results for polls without a definition are dropped.
    pub fn apply_results(&mut self, id: PollId, results: &Results) -> bool {
        let Some(poll) = self.polls.get_mut(&id) else {
            debug!("Dropping results for unknown poll {}", id);
            return false;
        };
        poll.apply_results(results, &self.users, self.clock.now())
    }

    /// Records where the poll is displayed and asks for fresh results if due.
    pub fn poll_shown(&mut self, id: PollId, message: MessageRef) -> Result<bool, SessionError> {
        let poll = self.polls.get_mut(&id).ok_or(SessionError::UnknownPoll(id))?;
        self.shown_in.insert(id, message);
        Ok(poll.check_results_reload(
            message,
            self.clock.now(),
            self.short_poll_timeout,
            self.reloader.as_ref(),
        ))
    }

    /// Runs the reload throttle over every displayed poll. Returns the number
    /// of reloads requested.
    pub fn sweep_reloads(&mut self) -> usize {
        let now = self.clock.now();
        let mut requested = 0;
        for (id, message) in &self.shown_in {
            if let Some(poll) = self.polls.get_mut(id) {
                if poll.check_results_reload(
                    *message,
                    now,
                    self.short_poll_timeout,
                    self.reloader.as_ref(),
                ) {
                    requested += 1;
                }
            }
        }
        requested
    }

    /// Closes the poll locally. Returns the close-forced definition to send
    /// to the server.
    pub fn close_poll(&mut self, id: PollId) -> Result<Definition, SessionError> {
        let poll = self.polls.get_mut(&id).ok_or(SessionError::UnknownPoll(id))?;
        let definition = poll.to_definition(true);
        poll.set_flags(definition.flags);
        info!("Closed poll {} locally (version {})", id, poll.version());
        Ok(definition)
    }

    /// Dispatches one decoded feed event. Returns whether any poll changed.
    pub fn handle(&mut self, event: FeedEvent) -> Result<bool, SessionError> {
        match event {
            FeedEvent::Definition(definition) => Ok(self.apply_definition(&definition)),
            FeedEvent::Results { poll_id, results } => Ok(self.apply_results(poll_id, &results)),
            FeedEvent::User(user) => {
                self.load_user(user);
                Ok(false)
            }
            FeedEvent::Shown { poll_id, message } => {
                self.poll_shown(poll_id, message)?;
                Ok(false)
            }
            FeedEvent::Close { poll_id } => {
                let before = self.poll(poll_id).map(PollData::version);
                let definition = self.close_poll(poll_id)?;
                match serde_json::to_string(&definition) {
                    Ok(json) => debug!("Close request for poll {}: {}", poll_id, json),
                    Err(e) => warn!("Failed to encode close request for poll {}: {}", poll_id, e),
                }
                Ok(before != self.poll(poll_id).map(PollData::version))
            }
        }
    }
}
