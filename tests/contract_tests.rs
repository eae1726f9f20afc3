//! Integration tests for the client against an in-memory SQLite database.
//!
//! These tests exercise the full operation family end to end:
//! - unique lookups, including composite keys
//! - filtered reads, ordering, cursor paging and distinct
//! - writes: create_many chunks, upsert, relative numeric updates
//! - relation loading with per-edge arguments
//! - aggregation and grouping
//! - transactions, batching and error classification

use std::sync::Once;

use assert_matches::assert_matches;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use futures::future::BoxFuture;
use pretty_assertions::assert_eq;
use serde_json::json;

use gmao_data::entities::{
    AccountCreate, AccountUpdate, AccountWhereUnique, ArticleCreate, ArticleInclude,
    AttachmentCreate, AttachmentTarget, AttachmentWhere, EntrepriseCreate, ObjetCreate,
    ObjetInclude, ObjetWhereUnique, SecteurCreate, SecteurField, SecteurInclude, SecteurUpdate,
    SecteurWhere, SecteurWhereUnique, SessionCreate, ShapeType, TaskCreate, TaskField,
    TaskInclude, TaskStatus, TaskType, TaskUpdate, TaskWhere, TaskWhereUnique, UserCreate,
    UserField, UserInclude, UserPermissionCreate, UserPermissionWhereUnique, UserRole, UserWhere,
    UserWhereUnique, VerificationTokenCreate, VerificationTokenWhereUnique, attachment,
};
use gmao_data::orm::ops;
use gmao_data::orm::update::IntUpdate;
use gmao_data::{
    AggregateArgs, Client, ClientOptions, CountSelect, DataError, ErrorCode, FindManyArgs,
    GroupByArgs, OrderBy, SqlValue, ToMany,
};

static TRACING: Once = Once::new();

/// Route the crate's statement logging through the test harness; filtered by
/// `RUST_LOG` so a failing run can be replayed with full SQL traces.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

async fn memory_client() -> Client {
    init_tracing();
    Client::connect(ClientOptions::new("sqlite::memory:"))
        .await
        .expect("in-memory client should connect")
}

/// One entreprise, one user, one objet with a secteur and an article.
struct Fixture {
    client: Client,
    user_id: i64,
    objet_id: i64,
    secteur_id: i64,
    article_id: i64,
}

async fn seeded() -> Fixture {
    let client = memory_client().await;
    let entreprise = client
        .entreprises()
        .create(&EntrepriseCreate::new("Acme Maintenance", "1 rue Haute"), None)
        .await
        .expect("create entreprise");
    let user = client
        .users()
        .create(
            &UserCreate::new("Ada", "ada@acme.test", "hash", entreprise.id),
            None,
        )
        .await
        .expect("create user");
    let objet = client
        .objets()
        .create(&ObjetCreate::new("Siège social", "1 rue Haute"), None)
        .await
        .expect("create objet");
    let secteur = client
        .secteurs()
        .create(&SecteurCreate::new("RDC", 1, objet.id), None)
        .await
        .expect("create secteur");
    let article = client
        .articles()
        .create(
            &ArticleCreate::new("Chaudière", ShapeType::Rectangle, secteur.id),
            None,
        )
        .await
        .expect("create article");
    Fixture {
        client,
        user_id: user.id,
        objet_id: objet.id,
        secteur_id: secteur.id,
        article_id: article.id,
    }
}

async fn seed_tasks(fx: &Fixture, count: usize) -> Vec<i64> {
    let inputs: Vec<TaskCreate> = (1..=count)
        .map(|i| {
            TaskCreate::new(
                format!("task {i}"),
                TaskType::Maintenance,
                fx.article_id,
                fx.user_id,
            )
        })
        .collect();
    let tasks = fx
        .client
        .tasks()
        .create_many_and_return(&inputs, false)
        .await
        .expect("seed tasks");
    tasks.iter().map(|t| t.id).collect()
}

#[tokio::test]
async fn unique_lookups_by_id_and_email() {
    let fx = seeded().await;
    let users = fx.client.users();

    let by_id = users
        .find_unique(&UserWhereUnique::Id(fx.user_id), None)
        .await
        .unwrap();
    assert_eq!(by_id.unwrap().email, "ada@acme.test");

    let by_email = users
        .find_unique(&UserWhereUnique::Email("ada@acme.test".into()), None)
        .await
        .unwrap();
    assert_eq!(by_email.unwrap().id, fx.user_id);

    let absent = users
        .find_unique(&UserWhereUnique::Email("nobody@acme.test".into()), None)
        .await
        .unwrap();
    assert!(absent.is_none());

    let err = users
        .find_unique_or_throw(&UserWhereUnique::Id(fx.user_id + 100), None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn composite_unique_keys_resolve() {
    let fx = seeded().await;

    fx.client
        .user_permissions()
        .create(&UserPermissionCreate::new(fx.user_id, fx.objet_id), None)
        .await
        .unwrap();
    let permission = fx
        .client
        .user_permissions()
        .find_unique(
            &UserPermissionWhereUnique::UserIdObjetId(fx.user_id, fx.objet_id),
            None,
        )
        .await
        .unwrap()
        .expect("permission by composite key");
    assert!(!permission.can_edit);

    fx.client
        .accounts()
        .create(
            &AccountCreate::new(fx.user_id, "oauth", "github", "gh-123"),
            None,
        )
        .await
        .unwrap();
    let account = fx
        .client
        .accounts()
        .find_unique(
            &AccountWhereUnique::ProviderProviderAccountId("github".into(), "gh-123".into()),
            None,
        )
        .await
        .unwrap()
        .expect("account by provider pair");
    assert_eq!(account.user_id, fx.user_id);

    let expires = Utc::now() + ChronoDuration::hours(1);
    fx.client
        .verification_tokens()
        .create(
            &VerificationTokenCreate::new("ada@acme.test", "tok-1", expires),
            None,
        )
        .await
        .unwrap();
    let token = fx
        .client
        .verification_tokens()
        .find_unique(
            &VerificationTokenWhereUnique::IdentifierToken("ada@acme.test".into(), "tok-1".into()),
            None,
        )
        .await
        .unwrap()
        .expect("token by identifier pair");
    assert_eq!(token.token, "tok-1");
}

#[tokio::test]
async fn empty_logical_groups_are_no_ops() {
    let fx = seeded().await;
    let all = fx
        .client
        .users()
        .find_many(FindManyArgs::default())
        .await
        .unwrap();

    let with_empty_groups = fx
        .client
        .users()
        .find_many(FindManyArgs::filtered(UserWhere {
            and: vec![UserWhere::default()],
            or: vec![],
            not: vec![UserWhere::default()],
            ..UserWhere::default()
        }))
        .await
        .unwrap();
    assert_eq!(with_empty_groups.len(), all.len());
}

#[tokio::test]
async fn cursor_paging_forward_and_backward() {
    let fx = seeded().await;
    let ids = seed_tasks(&fx, 6).await;
    let anchor = ids[2];

    let forward = fx
        .client
        .tasks()
        .find_many(FindManyArgs {
            cursor: Some(TaskWhereUnique::Id(anchor)),
            take: Some(2),
            ..FindManyArgs::default()
        })
        .await
        .unwrap();
    assert_eq!(
        forward.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![ids[2], ids[3]],
        "forward window starts at the anchor"
    );

    let backward = fx
        .client
        .tasks()
        .find_many(FindManyArgs {
            cursor: Some(TaskWhereUnique::Id(anchor)),
            take: Some(-2),
            ..FindManyArgs::default()
        })
        .await
        .unwrap();
    assert_eq!(
        backward.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![ids[1], ids[2]],
        "backward window ends at the anchor"
    );

    let skipped = fx
        .client
        .tasks()
        .find_many(FindManyArgs {
            cursor: Some(TaskWhereUnique::Id(anchor)),
            skip: Some(1),
            take: Some(2),
            ..FindManyArgs::default()
        })
        .await
        .unwrap();
    assert_eq!(
        skipped.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![ids[3], ids[4]]
    );

    let missing_anchor = fx
        .client
        .tasks()
        .find_many(FindManyArgs {
            cursor: Some(TaskWhereUnique::Id(ids[5] + 100)),
            take: Some(2),
            ..FindManyArgs::default()
        })
        .await
        .unwrap_err();
    assert_eq!(missing_anchor.code(), Some(ErrorCode::NotFound));
}

#[tokio::test]
async fn negative_take_without_cursor_keeps_the_tail() {
    let fx = seeded().await;
    let ids = seed_tasks(&fx, 5).await;

    let tail = fx
        .client
        .tasks()
        .find_many(FindManyArgs {
            take: Some(-2),
            ..FindManyArgs::default()
        })
        .await
        .unwrap();
    assert_eq!(
        tail.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![ids[3], ids[4]],
        "last rows come back in the requested order"
    );
}

#[tokio::test]
async fn distinct_deduplicates_in_order() {
    let fx = seeded().await;
    for (i, role) in [UserRole::Member, UserRole::Admin, UserRole::Member]
        .into_iter()
        .enumerate()
    {
        let mut input = UserCreate::new(
            format!("user {i}"),
            format!("user{i}@acme.test"),
            "hash",
            1,
        );
        input.role = Some(role);
        fx.client.users().create(&input, None).await.unwrap();
    }

    let roles = fx
        .client
        .users()
        .find_many(FindManyArgs {
            distinct: vec![UserField::Role],
            ..FindManyArgs::default()
        })
        .await
        .unwrap();
    // Seed user is a member, so the first member row wins; one admin remains.
    assert_eq!(roles.len(), 2);

    let first_admin = fx
        .client
        .users()
        .find_first(FindManyArgs {
            r#where: Some(UserWhere {
                role: Some(gmao_data::orm::EnumFilter::eq(UserRole::Admin)),
                ..UserWhere::default()
            }),
            distinct: vec![UserField::Role],
            ..FindManyArgs::default()
        })
        .await
        .unwrap();
    assert_eq!(first_admin.unwrap().name, "user 1");
}

#[tokio::test]
async fn create_many_counts_and_skips_duplicates() {
    let fx = seeded().await;
    let inputs = vec![
        UserCreate::new("B", "b@acme.test", "hash", 1),
        UserCreate::new("C", "c@acme.test", "hash", 1),
        UserCreate::new("B again", "b@acme.test", "hash", 1),
    ];

    let err = fx
        .client
        .users()
        .create_many(&inputs, false)
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());

    let written = fx.client.users().create_many(&inputs, true).await.unwrap();
    assert_eq!(written, 2, "the duplicate email is ignored");
    assert_eq!(fx.client.users().count(None).await.unwrap(), 3);
}

#[tokio::test]
async fn update_with_empty_data_is_a_strict_lookup() {
    let fx = seeded().await;
    let ids = seed_tasks(&fx, 1).await;

    let unchanged = fx
        .client
        .tasks()
        .update(&TaskWhereUnique::Id(ids[0]), &TaskUpdate::default(), None)
        .await
        .unwrap();
    assert_eq!(unchanged.title, "task 1");
    assert_eq!(unchanged.status, TaskStatus::Todo);

    let err = fx
        .client
        .tasks()
        .update(
            &TaskWhereUnique::Id(ids[0] + 100),
            &TaskUpdate::default(),
            None,
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn update_touches_updated_at_unless_set_explicitly() {
    let fx = seeded().await;
    let old = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let mut input = TaskCreate::new("old task", TaskType::Inspection, fx.article_id, fx.user_id);
    input.created_at = Some(old);
    input.updated_at = Some(old);
    let task = fx.client.tasks().create(&input, None).await.unwrap();
    assert_eq!(task.updated_at, old);

    let touched = fx
        .client
        .tasks()
        .update(
            &TaskWhereUnique::Id(task.id),
            &TaskUpdate {
                status: Some(TaskStatus::Doing),
                ..TaskUpdate::default()
            },
            None,
        )
        .await
        .unwrap();
    assert!(touched.updated_at > old, "updated_at is touched on write");

    let pinned = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
    let explicit = fx
        .client
        .tasks()
        .update(
            &TaskWhereUnique::Id(task.id),
            &TaskUpdate {
                status: Some(TaskStatus::Done),
                updated_at: Some(pinned),
                ..TaskUpdate::default()
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(explicit.updated_at, pinned, "an explicit value wins");
}

#[tokio::test]
async fn upsert_creates_then_updates() {
    let fx = seeded().await;
    let key = AccountWhereUnique::ProviderProviderAccountId("github".into(), "gh-9".into());
    let create = AccountCreate::new(fx.user_id, "oauth", "github", "gh-9");
    let update = AccountUpdate {
        access_token: Some(Some("fresh-token".into())),
        ..AccountUpdate::default()
    };

    let created = fx
        .client
        .accounts()
        .upsert(&key, &create, &update, None)
        .await
        .unwrap();
    assert_eq!(created.access_token, None);

    let updated = fx
        .client
        .accounts()
        .upsert(&key, &create, &update, None)
        .await
        .unwrap();
    assert_eq!(created.id, updated.id);
    assert_eq!(updated.access_token.as_deref(), Some("fresh-token"));
    assert_eq!(fx.client.accounts().count(None).await.unwrap(), 1);
}

#[tokio::test]
async fn relative_numeric_updates_compose() {
    let fx = seeded().await;
    let key = SecteurWhereUnique::Id(fx.secteur_id);

    let incremented = fx
        .client
        .secteurs()
        .update(
            &key,
            &SecteurUpdate {
                floor: Some(IntUpdate::Increment(2)),
                ..SecteurUpdate::default()
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(incremented.floor, 3);

    let multiplied = fx
        .client
        .secteurs()
        .update(
            &key,
            &SecteurUpdate {
                floor: Some(IntUpdate::Multiply(2)),
                ..SecteurUpdate::default()
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(multiplied.floor, 6);
}

#[tokio::test]
async fn invalid_argument_shapes_are_rejected() {
    let fx = seeded().await;

    let select_and_include = fx
        .client
        .users()
        .find_many(FindManyArgs {
            select: Some(vec![UserField::Email]),
            include: Some(UserInclude::default()),
            ..FindManyArgs::default()
        })
        .await
        .unwrap_err();
    assert_matches!(select_and_include, DataError::Validation(_));

    let cursor_and_distinct = fx
        .client
        .users()
        .find_many(FindManyArgs {
            cursor: Some(UserWhereUnique::Id(fx.user_id)),
            distinct: vec![UserField::Role],
            ..FindManyArgs::default()
        })
        .await
        .unwrap_err();
    assert_matches!(cursor_and_distinct, DataError::Validation(_));

    let ordering_outside_by = fx
        .client
        .tasks()
        .group_by(GroupByArgs {
            by: vec![TaskField::Status],
            order_by: vec![OrderBy::asc(TaskField::Title)],
            count: Some(CountSelect::All),
            ..GroupByArgs::default()
        })
        .await
        .unwrap_err();
    assert_matches!(ordering_outside_by, DataError::Validation(_));
}

#[tokio::test]
async fn include_loads_relations_with_per_edge_args() {
    let fx = seeded().await;
    let ids = seed_tasks(&fx, 3).await;
    fx.client
        .attachments()
        .create(
            &AttachmentCreate {
                task_id: Some(ids[2]),
                ..AttachmentCreate::new("s3://bucket/report.pdf", AttachmentTarget::Task(ids[2]))
            },
            None,
        )
        .await
        .unwrap();

    let user = fx
        .client
        .users()
        .find_unique(
            &UserWhereUnique::Id(fx.user_id),
            Some(&UserInclude {
                tasks: Some(ToMany {
                    order_by: vec![OrderBy::desc(TaskField::Id)],
                    take: Some(2),
                    include: Some(TaskInclude {
                        attachments: Some(ToMany::all()),
                    }),
                    ..ToMany::default()
                }),
                ..UserInclude::default()
            }),
        )
        .await
        .unwrap()
        .expect("seed user");

    let tasks = user.tasks.expect("tasks loaded");
    assert_eq!(
        tasks.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![ids[2], ids[1]],
        "per-edge ordering and take apply"
    );
    let attachments = tasks[0].attachments.as_ref().expect("nested include ran");
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].url, "s3://bucket/report.pdf");
    assert!(tasks[1].attachments.as_ref().unwrap().is_empty());
}

#[tokio::test]
async fn nested_include_walks_the_containment_chain() {
    let fx = seeded().await;
    let task_ids = seed_tasks(&fx, 2).await;
    // A second secteur with no articles stays an empty branch.
    fx.client
        .secteurs()
        .create(&SecteurCreate::new("R+1", 2, fx.objet_id), None)
        .await
        .unwrap();

    let objet = fx
        .client
        .objets()
        .find_unique(
            &ObjetWhereUnique::Id(fx.objet_id),
            Some(&ObjetInclude {
                secteurs: Some(ToMany {
                    order_by: vec![OrderBy::asc(SecteurField::Floor)],
                    include: Some(SecteurInclude {
                        articles: Some(ToMany {
                            include: Some(ArticleInclude {
                                tasks: Some(ToMany::all()),
                            }),
                            ..ToMany::default()
                        }),
                    }),
                    ..ToMany::default()
                }),
                ..ObjetInclude::default()
            }),
        )
        .await
        .unwrap()
        .expect("seed objet");

    let secteurs = objet.secteurs.expect("secteurs loaded");
    assert_eq!(
        secteurs.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        vec!["RDC", "R+1"]
    );
    let articles = secteurs[0].articles.as_ref().expect("articles loaded");
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].name, "Chaudière");
    let tasks = articles[0].tasks.as_ref().expect("tasks loaded");
    assert_eq!(tasks.iter().map(|t| t.id).collect::<Vec<_>>(), task_ids);
    assert!(
        secteurs[1].articles.as_ref().unwrap().is_empty(),
        "a secteur with no articles still gets an empty list"
    );
}

#[tokio::test]
async fn attachment_targets_round_trip() {
    let fx = seeded().await;
    let target = AttachmentTarget::Article(fx.article_id);
    fx.client
        .attachments()
        .create(&AttachmentCreate::new("s3://bucket/photo.jpg", target), None)
        .await
        .unwrap();

    let found = fx
        .client
        .attachments()
        .find_many(FindManyArgs::filtered(AttachmentWhere::for_target(target)))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].target(), Some(target));

    let (live, dead) = fx
        .client
        .transaction(|cx| {
            Box::pin(async move {
                let live = attachment::target_exists(&mut cx.reborrow(), target).await?;
                let dead =
                    attachment::target_exists(&mut cx.reborrow(), AttachmentTarget::Objet(999))
                        .await?;
                Ok((live, dead))
            })
        })
        .await
        .unwrap();
    assert!(live);
    assert!(!dead);

    // The pair carries no FK: pointing at a nonexistent row is accepted.
    let dangling = fx
        .client
        .attachments()
        .create(
            &AttachmentCreate::new("s3://bucket/orphan.jpg", AttachmentTarget::Objet(999)),
            None,
        )
        .await;
    assert!(dangling.is_ok());
}

#[tokio::test]
async fn aggregate_and_group_by_report_numbers() {
    let fx = seeded().await;
    for (name, floor) in [("R+1", 2), ("R+2", 3)] {
        fx.client
            .secteurs()
            .create(&SecteurCreate::new(name, floor, fx.objet_id), None)
            .await
            .unwrap();
    }

    let aggregates = fx
        .client
        .secteurs()
        .aggregate(AggregateArgs {
            r#where: None,
            count: Some(CountSelect::All),
            avg: vec![gmao_data::entities::secteur::SecteurField::Floor],
            sum: vec![gmao_data::entities::secteur::SecteurField::Floor],
            min: vec![],
            max: vec![],
        })
        .await
        .unwrap();
    assert_eq!(aggregates.count_all, Some(3));
    assert_eq!(aggregates.avg.get("floor").copied(), Some(Some(2.0)));
    assert_eq!(aggregates.sum.get("floor"), Some(&json!(6)));

    let ids = seed_tasks(&fx, 3).await;
    fx.client
        .tasks()
        .update(
            &TaskWhereUnique::Id(ids[0]),
            &TaskUpdate {
                status: Some(TaskStatus::Done),
                ..TaskUpdate::default()
            },
            None,
        )
        .await
        .unwrap();

    let groups = fx
        .client
        .tasks()
        .group_by(GroupByArgs {
            by: vec![TaskField::Status],
            count: Some(CountSelect::All),
            ..GroupByArgs::default()
        })
        .await
        .unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].keys.get("status"), Some(&json!("done")));
    assert_eq!(groups[0].aggregates.count_all, Some(1));
    assert_eq!(groups[1].keys.get("status"), Some(&json!("todo")));
    assert_eq!(groups[1].aggregates.count_all, Some(2));
}

#[tokio::test]
async fn count_select_reports_non_null_fields() {
    let fx = seeded().await;
    let ids = seed_tasks(&fx, 2).await;
    fx.client
        .tasks()
        .update(
            &TaskWhereUnique::Id(ids[0]),
            &TaskUpdate {
                description: Some(Some("check the pressure valve".into())),
                ..TaskUpdate::default()
            },
            None,
        )
        .await
        .unwrap();

    let counts = fx
        .client
        .tasks()
        .count_select(None, &[TaskField::Description])
        .await
        .unwrap();
    assert_eq!(counts.all, 2);
    assert_eq!(counts.fields.get("description"), Some(&1));
}

#[tokio::test]
async fn update_many_and_delete_many_honor_limits() {
    let fx = seeded().await;
    seed_tasks(&fx, 4).await;

    let updated = fx
        .client
        .tasks()
        .update_many(
            &TaskWhere::default(),
            &TaskUpdate {
                status: Some(TaskStatus::Doing),
                ..TaskUpdate::default()
            },
            Some(2),
        )
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let err = fx
        .client
        .tasks()
        .delete_many(&TaskWhere::default(), Some(-1))
        .await
        .unwrap_err();
    assert_matches!(err, DataError::Validation(_));

    let deleted = fx
        .client
        .tasks()
        .delete_many(&TaskWhere::default(), Some(3))
        .await
        .unwrap();
    assert_eq!(deleted, 3);
    assert_eq!(fx.client.tasks().count(None).await.unwrap(), 1);
}

#[tokio::test]
async fn constraint_failures_map_to_error_codes() {
    let fx = seeded().await;

    let duplicate = fx
        .client
        .users()
        .create(&UserCreate::new("Twin", "ada@acme.test", "hash", 1), None)
        .await
        .unwrap_err();
    assert!(duplicate.is_unique_violation());

    let orphan = fx
        .client
        .users()
        .create(&UserCreate::new("Ghost", "ghost@acme.test", "hash", 9999), None)
        .await
        .unwrap_err();
    assert!(orphan.is_foreign_key_violation());

    let busy_delete = fx
        .client
        .objets()
        .delete(
            &gmao_data::entities::ObjetWhereUnique::Id(fx.objet_id),
            None,
        )
        .await
        .unwrap_err();
    assert!(
        busy_delete.is_foreign_key_violation(),
        "objet still referenced by its secteur"
    );
}

#[tokio::test]
async fn transaction_rolls_back_on_error() {
    let fx = seeded().await;
    let user_id = fx.user_id;
    let expires = Utc::now() + ChronoDuration::days(7);

    let result: Result<(), DataError> = fx
        .client
        .transaction(move |cx| {
            Box::pin(async move {
                ops::create::<gmao_data::entities::Session>(
                    cx,
                    &SessionCreate::new("doomed-token", user_id, expires),
                    None,
                )
                .await?;
                Err(DataError::validation("abort"))
            })
        })
        .await;
    assert!(result.is_err());
    assert_eq!(fx.client.sessions().count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn batch_commits_all_operations_together() {
    let fx = seeded().await;
    let objet_id = fx.objet_id;

    let to_json = |err: serde_json::Error| DataError::validation(err.to_string());
    let results = fx
        .client
        .batch(vec![
            Box::new(move |cx: &mut gmao_data::orm::Conn<'_>| -> BoxFuture<'_, gmao_data::Result<serde_json::Value>> {
                Box::pin(async move {
                    let secteur = ops::create::<gmao_data::entities::Secteur>(
                        cx,
                        &SecteurCreate::new("R+1", 2, objet_id),
                        None,
                    )
                    .await?;
                    serde_json::to_value(&secteur).map_err(to_json)
                })
            }),
            Box::new(move |cx: &mut gmao_data::orm::Conn<'_>| -> BoxFuture<'_, gmao_data::Result<serde_json::Value>> {
                Box::pin(async move {
                    let count = ops::count::<gmao_data::entities::Secteur>(
                        cx,
                        Some(&SecteurWhere {
                            objet_id: Some(gmao_data::orm::IntFilter::eq(objet_id)),
                            ..SecteurWhere::default()
                        }),
                    )
                    .await?;
                    Ok(json!(count))
                })
            }),
        ])
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["name"], json!("R+1"));
    assert_eq!(results[1], json!(2), "second op sees the first op's write");

    // A failing operation rolls back everything queued before it.
    let failed = fx
        .client
        .batch(vec![
            Box::new(move |cx: &mut gmao_data::orm::Conn<'_>| -> BoxFuture<'_, gmao_data::Result<serde_json::Value>> {
                Box::pin(async move {
                    let secteur = ops::create::<gmao_data::entities::Secteur>(
                        cx,
                        &SecteurCreate::new("R+2", 3, objet_id),
                        None,
                    )
                    .await?;
                    serde_json::to_value(&secteur).map_err(to_json)
                })
            }),
            Box::new(move |cx: &mut gmao_data::orm::Conn<'_>| -> BoxFuture<'_, gmao_data::Result<serde_json::Value>> {
                Box::pin(async move {
                    // FK violation: no such objet.
                    let secteur = ops::create::<gmao_data::entities::Secteur>(
                        cx,
                        &SecteurCreate::new("nowhere", 0, 9999),
                        None,
                    )
                    .await?;
                    serde_json::to_value(&secteur).map_err(to_json)
                })
            }),
        ])
        .await
        .unwrap_err();
    assert!(failed.is_foreign_key_violation());
    assert_eq!(
        fx.client.secteurs().count(None).await.unwrap(),
        2,
        "the batch's first write was rolled back"
    );
}

#[tokio::test]
async fn projection_applies_select_and_global_omit() {
    let client = Client::connect(
        ClientOptions::new("sqlite::memory:").with_omit("users", ["password_hash"]),
    )
    .await
    .unwrap();
    client
        .entreprises()
        .create(&EntrepriseCreate::new("Acme", "addr"), None)
        .await
        .unwrap();
    client
        .users()
        .create(&UserCreate::new("Ada", "ada@acme.test", "hash", 1), None)
        .await
        .unwrap();

    let omitted = client
        .users()
        .find_many_projected(FindManyArgs::default())
        .await
        .unwrap();
    assert!(omitted[0].get("email").is_some());
    assert!(
        omitted[0].get("password_hash").is_none(),
        "client-level omit strips the column"
    );

    let selected = client
        .users()
        .find_many_projected(FindManyArgs {
            select: Some(vec![UserField::Id, UserField::Email]),
            ..FindManyArgs::default()
        })
        .await
        .unwrap();
    assert_eq!(selected[0], json!({ "id": 1, "email": "ada@acme.test" }));
}

#[tokio::test]
async fn file_backed_database_persists_across_connections() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("gmao.db").display());

    let client = Client::connect(ClientOptions::new(&url)).await.unwrap();
    client
        .entreprises()
        .create(&EntrepriseCreate::new("Acme", "1 rue Haute"), None)
        .await
        .unwrap();
    client.disconnect().await;

    // A fresh connection re-runs the additive schema sync and sees the data.
    let reopened = Client::connect(ClientOptions::new(&url)).await.unwrap();
    assert_eq!(reopened.entreprises().count(None).await.unwrap(), 1);
}

#[tokio::test]
async fn raw_queries_round_trip_json() {
    let fx = seeded().await;

    let rows = fx
        .client
        .query_raw(
            "SELECT name, floor FROM secteurs WHERE objet_id = ? ORDER BY floor",
            vec![SqlValue::Int(fx.objet_id)],
        )
        .await
        .unwrap();
    assert_eq!(rows, vec![json!({ "name": "RDC", "floor": 1 })]);

    let affected = fx
        .client
        .execute_raw(
            "UPDATE secteurs SET floor = floor + 1 WHERE objet_id = ?",
            vec![SqlValue::Int(fx.objet_id)],
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);
}
