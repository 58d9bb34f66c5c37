use super::common::*;

use crate::workflows::membership::{
    Capability, CourseDraft, CourseLevel, EntityKind, MembershipError, ProjectDraft, ProjectId,
    ValidationError,
};

fn draft(name: Option<&str>) -> ProjectDraft {
    ProjectDraft {
        name: name.map(str::to_string),
        description: "Graph neural networks for logistics".to_string(),
        categories: Vec::new(),
    }
}

#[test]
fn staff_create_update_and_delete_projects() {
    let fixture = fixture();
    let staff = fixture.staff_actor();

    let mut input = draft(Some("Routing"));
    input.categories = vec![fixture.research.id];
    let project = fixture
        .service
        .create_project(&staff, input)
        .expect("create");
    assert_eq!(project.display_name(), "Routing");
    assert!(project.categories.contains(&fixture.research.id));

    let updated = fixture
        .service
        .update_project(&staff, project.id, draft(None))
        .expect("update");
    assert_eq!(updated.display_name(), "Unnamed Project");
    assert!(updated.categories.is_empty());

    fixture
        .service
        .delete_project(&staff, project.id)
        .expect("delete");
    assert!(matches!(
        fixture.service.delete_project(&staff, project.id),
        Err(MembershipError::NotFound {
            entity: EntityKind::Project,
            ..
        })
    ));
}

#[test]
fn catalog_writes_are_staff_only() {
    let fixture = fixture();
    assert!(matches!(
        fixture
            .service
            .create_project(&fixture.applicant_actor(), draft(Some("Mine"))),
        Err(MembershipError::Forbidden(Capability::ManageCatalog))
    ));
    assert!(matches!(
        fixture
            .service
            .delete_project(&fixture.applicant_actor(), fixture.ai_project.id),
        Err(MembershipError::Forbidden(Capability::ManageCatalog))
    ));
}

#[test]
fn project_validation_errors_surface_unchanged() {
    let fixture = fixture();
    let staff = fixture.staff_actor();
    assert!(matches!(
        fixture.service.create_project(&staff, draft(Some("AI, ML"))),
        Err(MembershipError::Validation(
            ValidationError::CommaInProjectName
        ))
    ));

    let mut input = draft(Some("Tagged"));
    input.categories = vec![fixture.research.id, crate::workflows::membership::CategoryId(99)];
    assert!(matches!(
        fixture.service.create_project(&staff, input),
        Err(MembershipError::Validation(ValidationError::UnknownCategory(_)))
    ));

    assert!(matches!(
        fixture
            .service
            .update_project(&staff, ProjectId(404), draft(Some("Ghost"))),
        Err(MembershipError::NotFound { .. })
    ));
}

#[test]
fn courses_validate_level_and_languages() {
    let fixture = fixture();
    let staff = fixture.staff_actor();
    let course = fixture
        .service
        .create_course(
            &staff,
            CourseDraft {
                name: "Async Rust".to_string(),
                description: "Futures and executors".to_string(),
                level: 5,
                languages: vec![fixture.rust.id],
            },
        )
        .expect("create course");
    assert_eq!(course.level, CourseLevel::Expert);

    let error = fixture
        .service
        .update_course(
            &staff,
            course.id,
            CourseDraft {
                name: "Async Rust".to_string(),
                description: "Futures and executors".to_string(),
                level: 0,
                languages: Vec::new(),
            },
        )
        .expect_err("level zero");
    assert!(matches!(
        error,
        MembershipError::Validation(ValidationError::LevelOutOfRange(0))
    ));
    assert_eq!(error.code(), "validation_error");

    let removed = fixture
        .service
        .delete_course(&staff, course.id)
        .expect("delete course");
    assert_eq!(removed.id, course.id);
}

#[test]
fn tag_listings_require_authentication() {
    let fixture = fixture();
    let categories = fixture
        .service
        .categories(&fixture.applicant_actor())
        .expect("categories");
    assert_eq!(categories.len(), 2);
    let languages = fixture
        .service
        .languages(&fixture.applicant_actor())
        .expect("languages");
    assert_eq!(languages[0].name, "Python");
    assert!(fixture
        .service
        .categories(&crate::workflows::membership::Actor::Anonymous)
        .is_err());
}
