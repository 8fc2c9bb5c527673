use chrono::Duration;
use fit_core::model::{ExerciseId, Workout, WorkoutId, WorkoutSessionSummary};
use fit_core::time::fixed_now;
use storage::repository::{StorageError, WorkoutRepository, WorkoutSessionRepository};
use storage::sqlite::SqliteRepository;

fn build_workout(id: &str, exercises: &[&str]) -> Workout {
    Workout::new(
        WorkoutId::new(id),
        format!("Workout {id}"),
        exercises.iter().copied().map(ExerciseId::new).collect(),
        fixed_now(),
    )
    .unwrap()
}

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrip_keeps_exercise_order() {
    let repo = connect("memdb_workouts").await;

    let workout = build_workout("W1", &["squat", "bench", "row"]);
    repo.upsert_workout(&workout).await.unwrap();

    let fetched = repo
        .get_workout(workout.id())
        .await
        .unwrap()
        .expect("workout stored");
    assert_eq!(fetched, workout);

    let reordered = build_workout("W1", &["row", "squat"]);
    repo.upsert_workout(&reordered).await.unwrap();
    let fetched = repo.get_workout(workout.id()).await.unwrap().unwrap();
    assert_eq!(fetched.exercises(), reordered.exercises());

    assert!(
        repo.get_workout(&WorkoutId::new("missing"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn sqlite_records_and_lists_sessions() {
    let repo = connect("memdb_sessions").await;
    let workout = build_workout("W1", &["E1", "E2", "E3"]);
    repo.upsert_workout(&workout).await.unwrap();

    let first = WorkoutSessionSummary::new(workout.id().clone(), 120, 2, 3).unwrap();
    let second = WorkoutSessionSummary::new(workout.id().clone(), 45, 3, 3).unwrap();
    let id1 = repo.record_session(&first, fixed_now()).await.unwrap();
    let id2 = repo
        .record_session(&second, fixed_now() + Duration::hours(1))
        .await
        .unwrap();

    let rows = repo.list_sessions(workout.id(), 10).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, id2);
    assert_eq!(rows[1].summary, first);

    let limited = repo.list_sessions(workout.id(), 1).await.unwrap();
    assert_eq!(limited.len(), 1);

    let fetched = repo.get_session(id1).await.unwrap();
    assert_eq!(fetched.summary.duration_seconds(), 120);
    assert_eq!(fetched.recorded_at, fixed_now());
}

#[tokio::test]
async fn sqlite_rejects_sessions_for_unknown_workout() {
    let repo = connect("memdb_unknown").await;
    let summary = WorkoutSessionSummary::new(WorkoutId::new("ghost"), 30, 0, 2).unwrap();
    let err = repo.record_session(&summary, fixed_now()).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));

    let err = repo.get_session(999).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}
