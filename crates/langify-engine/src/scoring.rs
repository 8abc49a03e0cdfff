use chrono::{DateTime, Duration, TimeDelta, Utc};
use langify_types::models::{Content, TimerConfig};
use thiserror::Error;

/// Bonus for finishing a timed lesson instantly; decays linearly to 0 at the deadline.
pub const MAX_TIME_BONUS: u32 = 100;

/// Grades one answer. Fill-in-blank ignores case and surrounding whitespace;
/// every choice variant needs the exact option text.
pub fn is_correct(content: &Content, answer: &str) -> bool {
    match content {
        Content::FillInBlank(d) => {
            answer.trim().to_lowercase() == d.correct_answer.trim().to_lowercase()
        }
        Content::MultipleChoice(_)
        | Content::AudioMultipleChoiceText(_)
        | Content::AudioMultipleChoiceTranslation(_) => answer == content.correct_answer(),
    }
}

/// Time bonus for a lesson finished after `elapsed`.
pub fn time_bonus(timer: &TimerConfig, elapsed: TimeDelta) -> u32 {
    if !timer.is_timed() {
        return 0;
    }
    let elapsed_ms = elapsed.num_milliseconds();
    if elapsed_ms <= 0 {
        return 0;
    }

    let elapsed = elapsed_ms as f64 / 1000.0;
    let duration = f64::from(timer.duration_secs);
    if elapsed >= duration {
        return 0;
    }

    let bonus = (f64::from(MAX_TIME_BONUS) * (1.0 - elapsed / duration)).round();
    bonus.max(0.0) as u32
}

/// Highest final score a lesson can produce.
pub fn max_score<'a>(items: impl IntoIterator<Item = &'a Content>, timer: &TimerConfig) -> u32 {
    let points = items
        .into_iter()
        .fold(0u32, |acc, c| acc.saturating_add(c.points_awarded()));
    if timer.is_timed() {
        points.saturating_add(MAX_TIME_BONUS)
    } else {
        points
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalScore {
    pub accumulated: u32,
    pub bonus: u32,
    pub total: u32,
    pub elapsed: TimeDelta,
    pub auto_finished: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    InProgress { current_index: usize, accumulated: u32 },
    Submitting(FinalScore),
    Completed(FinalScore),
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub points_awarded: u32,
    pub accumulated: u32,
    pub remaining: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("lesson session is no longer in progress")]
    NotInProgress,
    #[error("lesson session is not awaiting submission")]
    NotSubmitting,
    #[error("every item has already been answered")]
    NoItemsRemaining,
    #[error("{0} item(s) still unanswered")]
    ItemsRemaining(usize),
    #[error("time is up")]
    TimeUp,
}

/// One attempt at a lesson, driven item by item.
///
/// `InProgress` -> `Submitting` once the last item is answered and the
/// caller finishes (or the countdown expires), then `Completed` when the
/// score is persisted or `Aborted` when persisting fails.
#[derive(Debug, Clone)]
pub struct LessonSession {
    lesson_id: String,
    items: Vec<Content>,
    timer: TimerConfig,
    started_at: DateTime<Utc>,
    state: SessionState,
}

impl LessonSession {
    pub fn start(
        lesson_id: impl Into<String>,
        items: Vec<Content>,
        timer: TimerConfig,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            lesson_id: lesson_id.into(),
            items,
            timer,
            started_at,
            state: SessionState::InProgress {
                current_index: 0,
                accumulated: 0,
            },
        }
    }

    pub fn lesson_id(&self) -> &str {
        &self.lesson_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.timer
            .is_timed()
            .then(|| self.started_at + Duration::seconds(i64::from(self.timer.duration_secs)))
    }

    /// True once the countdown has reached zero.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline().is_some_and(|d| now >= d)
    }

    pub fn current_item(&self) -> Option<&Content> {
        match self.state {
            SessionState::InProgress { current_index, .. } => self.items.get(current_index),
            _ => None,
        }
    }

    /// Grades the current item and moves to the next one. Answers are
    /// final; there is no going back.
    pub fn answer(&mut self, answer: &str, now: DateTime<Utc>) -> Result<AnswerOutcome, SessionError> {
        let SessionState::InProgress {
            current_index,
            accumulated,
        } = self.state
        else {
            return Err(SessionError::NotInProgress);
        };
        if self.is_expired(now) {
            return Err(SessionError::TimeUp);
        }
        let item = self
            .items
            .get(current_index)
            .ok_or(SessionError::NoItemsRemaining)?;

        let correct = is_correct(item, answer);
        let points_awarded = if correct { item.points_awarded() } else { 0 };
        let accumulated = accumulated.saturating_add(points_awarded);
        let current_index = current_index + 1;

        self.state = SessionState::InProgress {
            current_index,
            accumulated,
        };

        Ok(AnswerOutcome {
            correct,
            points_awarded,
            accumulated,
            remaining: self.items.len() - current_index,
        })
    }

    /// Moves to `Submitting` if the countdown ran out. Unanswered items score 0.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<FinalScore> {
        if !matches!(self.state, SessionState::InProgress { .. }) || !self.is_expired(now) {
            return None;
        }
        self.finish(now).ok()
    }

    /// Computes the time bonus and moves to `Submitting`. Allowed once every
    /// item is answered, or at any point after the deadline.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<FinalScore, SessionError> {
        let SessionState::InProgress {
            current_index,
            accumulated,
        } = self.state
        else {
            return Err(SessionError::NotInProgress);
        };

        let auto_finished = self.is_expired(now);
        let remaining = self.items.len() - current_index;
        if remaining > 0 && !auto_finished {
            return Err(SessionError::ItemsRemaining(remaining));
        }

        let elapsed = now - self.started_at;
        let bonus = time_bonus(&self.timer, elapsed);
        let score = FinalScore {
            accumulated,
            bonus,
            total: accumulated.saturating_add(bonus),
            elapsed,
            auto_finished,
        };
        self.state = SessionState::Submitting(score);
        Ok(score)
    }

    /// The score was persisted.
    pub fn complete(&mut self) -> Result<FinalScore, SessionError> {
        match self.state {
            SessionState::Submitting(score) => {
                self.state = SessionState::Completed(score);
                Ok(score)
            }
            _ => Err(SessionError::NotSubmitting),
        }
    }

    /// Persisting failed; the attempt is dropped.
    pub fn abort(&mut self) {
        self.state = SessionState::Aborted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use langify_types::models::{AudioChoiceData, ChoiceData, FillInBlankData};

    fn choice(correct: &str, points: u32) -> Content {
        Content::MultipleChoice(ChoiceData {
            question: "?".into(),
            options: vec!["Hello".into(), "Goodbye".into(), correct.into()],
            correct_answer: correct.into(),
            points_awarded: points,
        })
    }

    fn blank(correct: &str, points: u32) -> Content {
        Content::FillInBlank(FillInBlankData {
            sentence_before: "Sto ".into(),
            blank_placeholder: "...".into(),
            sentence_after: ".".into(),
            correct_answer: correct.into(),
            points_awarded: points,
        })
    }

    fn t0() -> DateTime<Utc> {
        "2024-05-01T12:00:00Z".parse().unwrap()
    }

    fn three_items() -> Vec<Content> {
        vec![choice("Ciao", 20), choice("Grazie", 20), blank("bene", 30)]
    }

    #[test]
    fn grading_rules_per_variant() {
        assert!(is_correct(&blank("bene", 10), "  BENE "));
        assert!(!is_correct(&blank("bene", 10), "ben"));
        assert!(is_correct(&choice("Hello", 10), "Hello"));
        assert!(!is_correct(&choice("Hello", 10), "hello"));

        let audio = Content::AudioMultipleChoiceTranslation(AudioChoiceData {
            audio_url: "/audio/ciao.mp3".into(),
            question: "?".into(),
            options: vec!["Hi".into()],
            correct_answer: "Hi".into(),
            points_awarded: 10,
        });
        assert!(is_correct(&audio, "Hi"));
        assert!(!is_correct(&audio, " Hi"));
    }

    #[test]
    fn time_bonus_curve() {
        let timer = TimerConfig::seconds(100);
        assert_eq!(time_bonus(&timer, Duration::seconds(50)), 50);
        assert_eq!(time_bonus(&timer, Duration::milliseconds(25_400)), 75);
        assert_eq!(time_bonus(&timer, Duration::seconds(100)), 0);
        assert_eq!(time_bonus(&timer, Duration::seconds(150)), 0);
        assert_eq!(time_bonus(&timer, Duration::zero()), 0);
        assert_eq!(time_bonus(&TimerConfig::untimed(), Duration::seconds(1)), 0);
    }

    #[test]
    fn untimed_lesson_all_correct() {
        let mut session = LessonSession::start("lesson-1", three_items(), TimerConfig::untimed(), t0());
        session.answer("Ciao", t0()).unwrap();
        session.answer("Grazie", t0()).unwrap();
        let last = session.answer("Bene", t0()).unwrap();
        assert_eq!(last.accumulated, 70);
        assert_eq!(last.remaining, 0);

        let score = session.finish(t0() + Duration::seconds(30)).unwrap();
        assert_eq!(score.bonus, 0);
        assert_eq!(score.total, 70);
        assert!(!score.auto_finished);
        assert_eq!(session.complete().unwrap().total, 70);
        assert!(matches!(session.state(), SessionState::Completed(_)));
    }

    #[test]
    fn timed_lesson_bonus_depends_on_speed() {
        let mut fast = LessonSession::start("l", three_items(), TimerConfig::seconds(100), t0());
        for a in ["Ciao", "Grazie", "bene"] {
            fast.answer(a, t0()).unwrap();
        }
        let score = fast.finish(t0() + Duration::seconds(50)).unwrap();
        assert_eq!((score.bonus, score.total), (50, 120));

        let mut slow = LessonSession::start("l", three_items(), TimerConfig::seconds(100), t0());
        for a in ["Ciao", "Grazie", "bene"] {
            slow.answer(a, t0() + Duration::seconds(10)).unwrap();
        }
        let score = slow.finish(t0() + Duration::seconds(100)).unwrap();
        assert_eq!((score.bonus, score.total), (0, 70));
    }

    #[test]
    fn wrong_answers_score_nothing_and_cannot_be_retried() {
        let mut session = LessonSession::start("l", three_items(), TimerConfig::untimed(), t0());
        let outcome = session.answer("Goodbye", t0()).unwrap();
        assert!(!outcome.correct);
        assert_eq!(outcome.points_awarded, 0);
        assert_eq!(outcome.remaining, 2);
        // The next answer grades the second item, not the first again.
        assert!(!session.answer("Ciao", t0()).unwrap().correct);
    }

    #[test]
    fn cannot_finish_with_items_left_before_deadline() {
        let mut session = LessonSession::start("l", three_items(), TimerConfig::seconds(60), t0());
        session.answer("Ciao", t0()).unwrap();
        assert_eq!(
            session.finish(t0() + Duration::seconds(10)),
            Err(SessionError::ItemsRemaining(2))
        );
        assert_eq!(session.tick(t0() + Duration::seconds(10)), None);
    }

    #[test]
    fn countdown_auto_finishes_with_partial_score() {
        let mut session = LessonSession::start("l", three_items(), TimerConfig::seconds(60), t0());
        session.answer("Ciao", t0() + Duration::seconds(5)).unwrap();

        let late = t0() + Duration::seconds(61);
        assert_eq!(session.answer("Grazie", late), Err(SessionError::TimeUp));

        let score = session.tick(late).unwrap();
        assert!(score.auto_finished);
        assert_eq!((score.accumulated, score.bonus, score.total), (20, 0, 20));
        assert!(matches!(session.state(), SessionState::Submitting(_)));
        assert_eq!(session.tick(late), None);
    }

    #[test]
    fn abort_is_terminal() {
        let mut session = LessonSession::start("l", vec![choice("Ciao", 10)], TimerConfig::untimed(), t0());
        session.answer("Ciao", t0()).unwrap();
        session.finish(t0()).unwrap();
        session.abort();
        assert_eq!(session.complete(), Err(SessionError::NotSubmitting));
        assert_eq!(session.answer("Ciao", t0()), Err(SessionError::NotInProgress));
        assert_eq!(session.current_item(), None);
    }

    #[test]
    fn max_score_includes_bonus_only_when_timed() {
        let items = three_items();
        assert_eq!(max_score(&items, &TimerConfig::untimed()), 70);
        assert_eq!(max_score(&items, &TimerConfig::seconds(30)), 170);
    }

    #[test]
    fn deadline_follows_timer() {
        let session = LessonSession::start("l", three_items(), TimerConfig::seconds(90), t0());
        assert_eq!(session.deadline(), Some(t0() + Duration::seconds(90)));
        assert!(!session.is_expired(t0() + Duration::seconds(89)));
        assert!(session.is_expired(t0() + Duration::seconds(90)));

        let untimed = LessonSession::start("l", three_items(), TimerConfig::untimed(), t0());
        assert_eq!(untimed.deadline(), None);
        assert!(!untimed.is_expired(t0() + Duration::days(3)));
    }
}
