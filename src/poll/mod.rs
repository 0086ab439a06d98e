use crate::models::{
    AnswerDefinition, AnswerVoters, Definition, MessageRef, PollAnswer, PollFlags, PollId,
    Results, User, UserId, MAX_OPTIONS,
};
use chrono::{DateTime, Duration, Utc};
use log::{debug, trace};
use std::sync::Arc;

/// Minimum time between two results reloads of an open poll.
pub const SHORT_POLL_TIMEOUT: Duration = Duration::milliseconds(30_000);

/// Resolves user ids to handles. Returns `None` for ids that are not loaded.
pub trait UserLookup {
    fn user(&self, id: UserId) -> Option<Arc<User>>;
}

/// Fire-and-forget request to refresh the results of the poll hosted by a message.
pub trait ResultsReloader {
    fn request_results_reload(&self, context: MessageRef);
}

/// Locally cached poll, reconciled against definition and results pushes.
#[derive(Debug, Clone)]
pub struct PollData {
    id: PollId,
    question: String,
    flags: PollFlags,
    answers: Vec<PollAnswer>,
    total_voters: u32,
    recent_voters: Vec<Arc<User>>,
    version: u32,
    last_results_update: Option<DateTime<Utc>>,
}

fn answer_by_option<'a>(list: &'a [PollAnswer], option: &[u8]) -> Option<&'a PollAnswer> {
    list.iter().find(|answer| answer.option == option)
}

impl PollData {
    pub fn new(id: PollId) -> Self {
        assert_ne!(id.0, 0, "poll id must be non-zero");
        Self {
            id,
            question: String::new(),
            flags: PollFlags::empty(),
            answers: Vec::new(),
            total_voters: 0,
            recent_voters: Vec::new(),
            version: 0,
            last_results_update: None,
        }
    }

    pub fn id(&self) -> PollId {
        self.id
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answers(&self) -> &[PollAnswer] {
        &self.answers
    }

    pub fn total_voters(&self) -> u32 {
        self.total_voters
    }

    pub fn recent_voters(&self) -> &[Arc<User>] {
        &self.recent_voters
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn last_results_update(&self) -> Option<DateTime<Utc>> {
        self.last_results_update
    }

    pub fn flags(&self) -> PollFlags {
        self.flags
    }

    pub fn closed(&self) -> bool {
        self.flags.contains(PollFlags::CLOSED)
    }

    pub fn public_votes(&self) -> bool {
        self.flags.contains(PollFlags::PUBLIC_VOTES)
    }

    pub fn multi_choice(&self) -> bool {
        self.flags.contains(PollFlags::MULTI_CHOICE)
    }

    pub fn quiz(&self) -> bool {
        self.flags.contains(PollFlags::QUIZ)
    }

    /// Whether the local viewer has chosen any answer.
    pub fn voted(&self) -> bool {
        self.answers.iter().any(|answer| answer.chosen)
    }

    pub fn answer_by_option(&self, option: &[u8]) -> Option<&PollAnswer> {
        answer_by_option(&self.answers, option)
    }

    fn answer_by_option_mut(&mut self, option: &[u8]) -> Option<&mut PollAnswer> {
        self.answers.iter_mut().find(|answer| answer.option == option)
    }

    pub fn set_flags(&mut self, flags: PollFlags) {
        if self.flags != flags {
            self.flags = flags;
            self.version = self.version.wrapping_add(1);
        }
    }

    /// Merges a full definition push. Returns whether anything changed.
    ///
    /// Answers are matched to the previous list by option key, so votes and
    /// the local chosen/correct marks follow an option wherever it moves.
    /// Option keys are expected to be unique; duplicates are not removed here
    /// and must be rejected by the decoder.
    pub fn apply_definition(&mut self, definition: &Definition) -> bool {
        assert_eq!(
            definition.id, self.id,
            "definition for poll {} applied to poll {}",
            definition.id, self.id
        );

        let mut new_answers: Vec<PollAnswer> = definition
            .answers
            .iter()
            .take(MAX_OPTIONS)
            .map(|AnswerDefinition { option, text }| PollAnswer {
                option: option.clone(),
                text: text.clone(),
                ..PollAnswer::default()
            })
            .collect();

        // Compared with the transient fields zeroed, so any poll carrying
        // votes or local marks counts as structurally changed.
        let header_changed = self.question != definition.question || self.flags != definition.flags;
        let answers_changed = self.answers != new_answers;
        if !header_changed && !answers_changed {
            trace!("Definition for poll {} is unchanged", self.id);
            return false;
        }
        if header_changed {
            self.question = definition.question.clone();
            self.flags = definition.flags;
        }
        if answers_changed {
            std::mem::swap(&mut self.answers, &mut new_answers);
            let previous = new_answers;
            for answer in &mut self.answers {
                if let Some(old) = answer_by_option(&previous, &answer.option) {
                    answer.votes = old.votes;
                    answer.chosen = old.chosen;
                    answer.correct = old.correct;
                }
            }
        }
        self.version = self.version.wrapping_add(1);
        debug!(
            "Poll {} definition applied (version {}, {} answers)",
            self.id,
            self.version,
            self.answers.len()
        );
        true
    }

    /// Merges a results push. The throttle clock is refreshed even when
    /// nothing changes.
    pub fn apply_results(
        &mut self,
        results: &Results,
        users: &impl UserLookup,
        now: DateTime<Utc>,
    ) -> bool {
        self.last_results_update = Some(now);

        let new_total_voters = results.total_voters.unwrap_or(self.total_voters);
        let mut changed = new_total_voters != self.total_voters;

        for result in &results.answers {
            if self.apply_result_to_answer(result, results.min) {
                changed = true;
            }
        }

        if let Some(recent) = &results.recent_voters {
            let recent_changed = !self
                .recent_voters
                .iter()
                .map(|user| user.id)
                .eq(recent.iter().copied());
            if recent_changed {
                changed = true;
                self.recent_voters = recent.iter().filter_map(|&id| users.user(id)).collect();
            }
        }

        if !changed {
            trace!("Results for poll {} carried no changes", self.id);
            return false;
        }
        self.total_voters = new_total_voters;
        self.version = self.version.wrapping_add(1);
        debug!(
            "Poll {} results applied (version {}, {} voters, min: {})",
            self.id, self.version, self.total_voters, results.min
        );
        true
    }

    fn apply_result_to_answer(&mut self, result: &AnswerVoters, min: bool) -> bool {
        let closed = self.closed();
        let Some(answer) = self.answer_by_option_mut(&result.option) else {
            debug!("Skipping results for unknown option {:?}", result.option);
            return false;
        };
        let mut changed = answer.votes != result.votes;
        if changed {
            answer.votes = result.votes;
        }
        if !min && answer.chosen != result.chosen {
            answer.chosen = result.chosen;
            changed = true;
        }
        if (!min || closed) && answer.correct != result.correct {
            answer.correct = result.correct;
            changed = true;
        }
        changed
    }

    /// Whether fresh results should be requested at `now`.
    pub fn should_reload(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        if self.closed() {
            return false;
        }
        match self.last_results_update {
            Some(last) => now - last >= interval,
            None => true,
        }
    }

    /// Requests a results reload for the hosting message if the throttle
    /// allows it. Returns whether a request was issued.
    pub fn check_results_reload(
        &mut self,
        context: MessageRef,
        now: DateTime<Utc>,
        interval: Duration,
        reloader: &dyn ResultsReloader,
    ) -> bool {
        if !self.should_reload(now, interval) {
            return false;
        }
        self.last_results_update = Some(now);
        debug!("Requesting results reload for poll {} in {}", self.id, context);
        reloader.request_results_reload(context);
        true
    }

    /// Wire-ready definition of the current state. `close` forces the
    /// closed flag on, for closing a poll before the server confirms it.
    pub fn to_definition(&self, close: bool) -> Definition {
        let mut flags = self.flags;
        if close {
            flags.set(PollFlags::CLOSED, true);
        }
        Definition {
            id: self.id,
            question: self.question.clone(),
            flags,
            answers: self
                .answers
                .iter()
                .map(|answer| AnswerDefinition {
                    option: answer.option.clone(),
                    text: answer.text.clone(),
                })
                .collect(),
        }
    }
}
