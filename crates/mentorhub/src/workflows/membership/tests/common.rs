use std::collections::BTreeSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;

use crate::workflows::membership::catalog::{CourseSpec, ProjectSpec};
use crate::workflows::membership::{
    membership_router, Actor, CatalogRepository, Category, Course, CourseLevel,
    DirectoryRepository, MemoryStore, MembershipService, ProgrammingLanguage, Project, Role,
    User, ACTOR_HEADER,
};

pub(super) struct Fixture {
    pub(super) store: Arc<MemoryStore>,
    pub(super) service: Arc<MembershipService<MemoryStore>>,
    pub(super) applicant: User,
    pub(super) second_applicant: User,
    pub(super) staff: User,
    pub(super) admin: User,
    pub(super) machine_learning: Category,
    pub(super) research: Category,
    pub(super) python: ProgrammingLanguage,
    pub(super) rust: ProgrammingLanguage,
    pub(super) ai_project: Project,
    pub(super) other_project: Project,
}

impl Fixture {
    pub(super) fn actor(user: &User) -> Actor {
        Actor::Authenticated(user.clone())
    }

    pub(super) fn applicant_actor(&self) -> Actor {
        Self::actor(&self.applicant)
    }

    pub(super) fn staff_actor(&self) -> Actor {
        Self::actor(&self.staff)
    }

    pub(super) fn admin_actor(&self) -> Actor {
        Self::actor(&self.admin)
    }

    pub(super) fn router(&self) -> Router {
        membership_router(self.service.clone())
    }

    pub(super) fn add_project(
        &self,
        name: Option<&str>,
        description: &str,
        categories: &[&Category],
    ) -> Project {
        self.store
            .insert_project(ProjectSpec {
                name: name.map(str::to_string),
                description: description.to_string(),
                categories: categories.iter().map(|category| category.id).collect(),
            })
            .expect("project inserted")
    }

    pub(super) fn add_course(
        &self,
        name: &str,
        level: CourseLevel,
        languages: &[&ProgrammingLanguage],
    ) -> Course {
        self.store
            .insert_course(CourseSpec {
                name: name.to_string(),
                description: format!("{name} course"),
                level,
                languages: languages.iter().map(|language| language.id).collect(),
            })
            .expect("course inserted")
    }
}

pub(super) fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let applicant = store.insert_user("ada", Role::User).expect("user");
    let second_applicant = store.insert_user("alan", Role::User).expect("user");
    let staff = store.insert_user("grace", Role::Staff).expect("staff");
    let admin = store.insert_user("root", Role::Admin).expect("admin");

    let machine_learning = store.insert_category("Machine Learning").expect("category");
    let research = store.insert_category("Research").expect("category");
    let python = store.insert_language("Python").expect("language");
    let rust = store.insert_language("Rust").expect("language");

    let ai_project = store
        .insert_project(ProjectSpec {
            name: Some("AI Project".to_string()),
            description: "desc A".to_string(),
            categories: BTreeSet::from([machine_learning.id]),
        })
        .expect("project");
    let other_project = store
        .insert_project(ProjectSpec {
            name: Some("Other".to_string()),
            description: "desc B".to_string(),
            categories: BTreeSet::from([research.id]),
        })
        .expect("project");

    Fixture {
        service: Arc::new(MembershipService::new(store.clone())),
        store,
        applicant,
        second_applicant,
        staff,
        admin,
        machine_learning,
        research,
        python,
        rust,
        ai_project,
        other_project,
    }
}

pub(super) fn request(
    method: &str,
    uri: &str,
    actor: Option<&User>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = actor {
        builder = builder.header(ACTOR_HEADER, user.id.to_string());
    }
    match body {
        Some(payload) => builder
            .header(axum::http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&payload).expect("serialize body")))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) async fn assert_error_code(response: Response, status: StatusCode, code: &str) {
    assert_eq!(response.status(), status);
    let payload = read_json_body(response).await;
    assert_eq!(payload["code"], code);
}
