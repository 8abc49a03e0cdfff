use chrono::{DateTime, TimeZone, Utc};
use langify_types::models::{
    AudioChoiceData, ChoiceData, Content, FillInBlankData, Language, Lesson, LessonContentItem,
    Notification, NotificationKind, TimerConfig,
};

use crate::DbResult;
use crate::models::LessonContentRow;

/// Static catalogue loaded into every fresh store.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub languages: Vec<Language>,
    pub lessons: Vec<Lesson>,
    pub content: Vec<LessonContentRow>,
    pub notifications: Vec<Notification>,
}

pub fn reference_data() -> DbResult<ReferenceData> {
    let content = content_items()
        .iter()
        .map(LessonContentRow::from_item)
        .collect::<DbResult<Vec<_>>>()?;

    Ok(ReferenceData {
        languages: languages(),
        lessons: lessons(),
        content,
        notifications: notifications(),
    })
}

fn languages() -> Vec<Language> {
    [("lang-1", "Italian", "it"), ("lang-2", "Spanish", "es"), ("lang-3", "French", "fr")]
        .into_iter()
        .map(|(id, name, code)| Language {
            id: id.into(),
            name: name.into(),
            code: code.into(),
            flag: format!("/flags/{code}.svg"),
        })
        .collect()
}

fn lesson(id: &str, language_id: &str, order: i32, title: &str, description: &str, timer: TimerConfig) -> Lesson {
    Lesson {
        id: id.into(),
        language_id: language_id.into(),
        title: title.into(),
        description: description.into(),
        order,
        timer,
    }
}

fn lessons() -> Vec<Lesson> {
    vec![
        lesson("lesson-1", "lang-1", 1, "Basic Greetings", "Learn how to say hello and goodbye.", TimerConfig::untimed()),
        lesson("lesson-2", "lang-1", 2, "Common Phrases", "Everyday expressions for travelers.", TimerConfig::untimed()),
        lesson("lesson-3", "lang-1", 3, "Numbers 1-10", "Count from one to ten in Italian.", TimerConfig::seconds(60)),
        lesson("lesson-4", "lang-1", 4, "Listening: Greetings", "Recognise greetings by ear.", TimerConfig::seconds(90)),
        lesson("lesson-5", "lang-2", 1, "Basic Greetings", "Hola, adiós and everything in between.", TimerConfig::untimed()),
        lesson("lesson-6", "lang-3", 1, "Basic Greetings", "Bonjour and bonsoir.", TimerConfig::seconds(120)),
    ]
}

fn mc(id: &str, lesson_id: &str, question: &str, options: &[&str], correct: &str, points: u32) -> LessonContentItem {
    LessonContentItem {
        id: id.into(),
        lesson_id: lesson_id.into(),
        content: Content::MultipleChoice(ChoiceData {
            question: question.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_answer: correct.into(),
            points_awarded: points,
        }),
    }
}

fn fib(id: &str, lesson_id: &str, before: &str, after: &str, correct: &str, points: u32) -> LessonContentItem {
    LessonContentItem {
        id: id.into(),
        lesson_id: lesson_id.into(),
        content: Content::FillInBlank(FillInBlankData {
            sentence_before: before.into(),
            blank_placeholder: "...".into(),
            sentence_after: after.into(),
            correct_answer: correct.into(),
            points_awarded: points,
        }),
    }
}

fn audio(
    id: &str,
    lesson_id: &str,
    translation: bool,
    audio_url: &str,
    question: &str,
    options: &[&str],
    correct: &str,
    points: u32,
) -> LessonContentItem {
    let data = AudioChoiceData {
        audio_url: audio_url.into(),
        question: question.into(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_answer: correct.into(),
        points_awarded: points,
    };
    LessonContentItem {
        id: id.into(),
        lesson_id: lesson_id.into(),
        content: if translation {
            Content::AudioMultipleChoiceTranslation(data)
        } else {
            Content::AudioMultipleChoiceText(data)
        },
    }
}

fn content_items() -> Vec<LessonContentItem> {
    vec![
        // Basic Greetings
        mc("content-1-1", "lesson-1", "What does 'Ciao' mean?", &["Hello", "Goodbye", "Thank you", "Please"], "Hello", 10),
        mc("content-1-2", "lesson-1", "How do you say 'Good morning'?", &["Buonanotte", "Buonasera", "Buongiorno", "Arrivederci"], "Buongiorno", 10),
        fib("content-1-3", "lesson-1", "Come stai? - Sto ", ".", "bene", 15),
        // Common Phrases
        mc("content-2-1", "lesson-2", "What does 'Grazie' mean?", &["Please", "Thank you", "Excuse me", "Sorry"], "Thank you", 10),
        fib("content-2-2", "lesson-2", "Per favore, ", ".", "un caffè", 20),
        mc("content-2-3", "lesson-2", "How do you say 'Excuse me'?", &["Scusa", "Prego", "Mi dispiace", "Permesso"], "Scusa", 10),
        // Numbers 1-10
        mc("content-3-1", "lesson-3", "What is 'due'?", &["One", "Two", "Three", "Four"], "Two", 10),
        fib("content-3-2", "lesson-3", "Cinque, sei, ", ".", "sette", 15),
        mc("content-3-3", "lesson-3", "What is 'dieci'?", &["Eight", "Nine", "Ten", "Eleven"], "Ten", 10),
        // Listening: Greetings
        audio("content-4-1", "lesson-4", false, "/audio/it/buongiorno.mp3", "Which word did you hear?", &["Buonasera", "Buongiorno", "Buonanotte"], "Buongiorno", 20),
        audio("content-4-2", "lesson-4", true, "/audio/it/arrivederci.mp3", "What does the speaker say?", &["See you later", "Goodbye", "Good evening"], "Goodbye", 20),
        // Spanish
        mc("content-5-1", "lesson-5", "What does 'Hola' mean?", &["Hello", "Goodbye", "Thanks"], "Hello", 10),
        fib("content-5-2", "lesson-5", "Buenos ", " (Good morning)", "días", 15),
        // French
        mc("content-6-1", "lesson-6", "What does 'Bonjour' mean?", &["Good night", "Hello", "Thanks"], "Hello", 10),
        audio("content-6-2", "lesson-6", false, "/audio/fr/merci.mp3", "Which word did you hear?", &["Merci", "Mercredi", "Marché"], "Merci", 20),
    ]
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).single().unwrap_or_default()
}

fn notifications() -> Vec<Notification> {
    vec![
        Notification {
            id: "notif-1".into(),
            message: "Welcome to Langify! Complete a lesson every day to build your streak.".into(),
            kind: NotificationKind::Info,
            created_at: at(2025, 1, 10),
        },
        Notification {
            id: "notif-2".into(),
            message: "Scheduled maintenance on Sunday at 02:00 UTC.".into(),
            kind: NotificationKind::Warning,
            created_at: at(2025, 1, 20),
        },
        Notification {
            id: "notif-3".into(),
            message: "Double points weekend starts Friday!".into(),
            kind: NotificationKind::Event,
            created_at: at(2025, 2, 1),
        },
    ]
}
