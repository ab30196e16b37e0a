use exam_core::StudyMode;
use exam_core::model::{Source, UserId};
use exam_core::time::fixed_now;
use services::{AppServices, Clock, ExamRequest, PracticeConfig};

const QUESTIONS: &str = r#"{
    "kahoot_info": {"theme": "Bones"},
    "questions": [
        {"text": "Longest bone?", "answers": [{"text": "Femur", "value": "++"}, {"text": "Ulna", "value": "--"}]},
        {"text": "Smallest bone?", "answers": [{"text": "Stapes", "value": "++"}, {"text": "Femur", "value": "--"}]},
        {"text": "Skull bones?", "answers": [{"text": "22", "value": "++"}, {"text": "12", "value": "--"}]},
        {"text": "Pumps blood?", "theme": "Heart", "answers": [{"text": "Heart", "value": "++"}, {"text": "Lung", "value": "--"}]}
    ]
}"#;

async fn services(name: &str, seed: u64) -> AppServices {
    AppServices::new_sqlite(
        &format!("sqlite:file:{name}?mode=memory&cache=shared"),
        Clock::fixed(fixed_now()),
        PracticeConfig {
            question_count: 3,
            seed: Some(seed),
        },
    )
    .await
    .expect("connect sqlite")
}

#[tokio::test]
async fn import_practice_and_report() {
    let app = services("memdb_practice_flow", 21).await;
    let course_id = app
        .courses()
        .create_course("Anatomy".into(), None)
        .await
        .expect("create course");

    let report = app
        .import()
        .import_json(course_id, Source::Kahoots, QUESTIONS)
        .await
        .expect("import");
    assert_eq!(report.created, 4);
    assert_eq!(
        app.practice().themes(course_id, Source::Kahoots).await.unwrap(),
        vec!["Bones".to_string(), "Heart".to_string()]
    );

    let user = UserId::new(1);
    let practice = app.practice();
    let mut exam = practice
        .start_exam(&ExamRequest::new(course_id, Source::Kahoots).for_user(user))
        .await
        .expect("start exam");
    assert_eq!(exam.total_questions(), 3);

    // Answer the first two correctly and leave the last one blank.
    let picks: Vec<_> = exam.questions()[..2]
        .iter()
        .map(|q| {
            let idx = q.answers().iter().position(|a| a.weight.is_correct()).unwrap();
            (q.id(), idx)
        })
        .collect();
    for (qid, idx) in picks {
        exam.answer(qid, idx).unwrap();
    }
    let skipped = exam.questions()[2].id();

    let outcome = practice.finish_exam(&exam, user).await.expect("finish");
    assert!(outcome.answers_recorded);
    assert_eq!(outcome.score.correct_count, 2);
    // Simple scoring: 20 * 2 / 3 = 13.33..
    assert_eq!(outcome.score.grade.to_string(), "13.3");

    let retry = practice
        .start_exam(
            &ExamRequest::new(course_id, Source::Kahoots)
                .with_mode(StudyMode::Wrong)
                .for_user(user),
        )
        .await
        .unwrap();
    assert_eq!(retry.questions()[0].id(), skipped);

    let stats = app
        .stats()
        .user_stats(user, course_id, Some(Source::Kahoots))
        .await
        .unwrap();
    assert_eq!(stats.total_exams, 1);
    assert_eq!(stats.passed_exams, 1);
    assert_eq!(stats.unique_questions_seen, 3);
    assert_eq!(stats.total_questions_in_pool, 4);
    assert_eq!(stats.average_grade, 13.3);

    let board = app.stats().leaderboard(Some(course_id), None, 10).await.unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].total_exams, 1);
}

#[tokio::test]
async fn theme_mode_stays_within_theme() {
    let app = services("memdb_theme_flow", 4).await;
    let course_id = app
        .courses()
        .create_course("Anatomy".into(), None)
        .await
        .unwrap();
    app.import()
        .import_json(course_id, Source::Ai, QUESTIONS)
        .await
        .unwrap();

    let exam = app
        .practice()
        .start_exam(
            &ExamRequest::new(course_id, Source::Ai)
                .with_mode(StudyMode::Theme)
                .with_theme("Heart"),
        )
        .await
        .unwrap();
    assert_eq!(exam.total_questions(), 1);
    assert_eq!(exam.questions()[0].text(), "Pumps blood?");
}
