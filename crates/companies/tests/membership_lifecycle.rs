mod common;

use common::Harness;
use userverse_core::{
    DefaultRole, MemberFilter, Pagination, RoleDeletion, RoleFilter, UserCompanyFilter,
};
use userverse_infra::Notification;

fn page() -> Pagination {
    Pagination::new(None, None).unwrap()
}

#[tokio::test]
async fn new_company_has_default_roles_and_founding_admin() {
    let h = Harness::new();
    let founder = h.user("a@x.com").await;
    let company = h.company("acme@x.com", &founder).await;

    let roles = h
        .roles
        .list_roles(company.id, &RoleFilter::default(), page(), &founder)
        .await
        .unwrap();
    let mut names: Vec<_> = roles.records.iter().map(|r| r.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["Administrator", "Viewer"]);
    assert_eq!(roles.pagination.total_records, 2);

    let viewer = roles.records.iter().find(|r| r.name == "Viewer").unwrap();
    assert_eq!(viewer.description.as_deref(), Some(DefaultRole::VIEWER.description));

    assert!(h
        .gate
        .is_linked(founder.id, company.id, Some("Administrator"))
        .await
        .unwrap());
}

#[tokio::test]
async fn link_then_unlink_scenario() {
    let mut h = Harness::new();
    let u1 = h.user("a@x.com").await;
    let u2 = h.user("b@x.com").await;
    let u3 = h.user("c@x.com").await;
    let c = h.company("acme@x.com", &u1).await;

    assert!(!h.members.is_linked(u2.id, c.id, None).await.unwrap());

    h.members.link(c.id, u2.id, "Viewer", &u1).await.unwrap();
    assert!(h.members.is_linked(u2.id, c.id, None).await.unwrap());
    assert!(h.members.is_linked(u2.id, c.id, Some("Viewer")).await.unwrap());
    assert!(!h.members.is_linked(u2.id, c.id, Some("Administrator")).await.unwrap());

    let closed = h.members.unlink(c.id, u2.id, &u1).await.unwrap();
    assert!(closed.timestamps.closed_at.is_some());
    assert_eq!(closed.metadata.primary().removed_by().unwrap().id, u1.id);
    assert!(!h.members.is_linked(u2.id, c.id, None).await.unwrap());

    // Default roles are protected, so the reassignment leg runs on a custom role.
    h.roles.create_role(c.id, "Staff", None, &u1).await.unwrap();
    h.members.link(c.id, u3.id, "Staff", &u1).await.unwrap();
    let deletion = RoleDeletion::new("Staff", "Administrator").unwrap();
    let outcome = h
        .roles
        .delete_role_and_reassign(c.id, &deletion, &u1)
        .await
        .unwrap();
    assert_eq!(outcome.users_reassigned, 1);
    assert!(h.members.is_linked(u3.id, c.id, Some("Administrator")).await.unwrap());
    assert!(!h.members.is_linked(u3.id, c.id, Some("Staff")).await.unwrap());

    let kinds: Vec<_> = h.drain().iter().map(Notification::kind).collect();
    assert_eq!(kinds, vec!["company_invite", "company_invite", "role_deleted"]);
}

#[tokio::test]
async fn second_active_link_conflicts() {
    let h = Harness::new();
    let u1 = h.user("a@x.com").await;
    let u2 = h.user("b@x.com").await;
    let c = h.company("acme@x.com", &u1).await;

    h.members.link(c.id, u2.id, "Viewer", &u1).await.unwrap();
    let err = h
        .members
        .link(c.id, u2.id, "Administrator", &u1)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "conflict");
}

#[tokio::test]
async fn relink_after_unlink_opens_fresh_row() {
    let h = Harness::new();
    let u1 = h.user("a@x.com").await;
    let u2 = h.user("b@x.com").await;
    let c = h.company("acme@x.com", &u1).await;

    let first = h.members.link(c.id, u2.id, "Viewer", &u1).await.unwrap();
    h.members.unlink(c.id, u2.id, &u1).await.unwrap();
    let second = h.members.link(c.id, u2.id, "Viewer", &u1).await.unwrap();
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn link_requires_active_role() {
    let h = Harness::new();
    let u1 = h.user("a@x.com").await;
    let u2 = h.user("b@x.com").await;
    let c = h.company("acme@x.com", &u1).await;

    let err = h.members.link(c.id, u2.id, "Ghost", &u1).await.unwrap_err();
    assert_eq!(err.kind(), "validation_error");
    assert!(!h.members.is_linked(u2.id, c.id, None).await.unwrap());
}

#[tokio::test]
async fn only_administrators_manage_members() {
    let h = Harness::new();
    let u1 = h.user("a@x.com").await;
    let u2 = h.user("b@x.com").await;
    let u3 = h.user("c@x.com").await;
    let outsider = h.user("d@x.com").await;
    let c = h.company("acme@x.com", &u1).await;
    h.members.link(c.id, u2.id, "Viewer", &u1).await.unwrap();

    let err = h.members.link(c.id, u3.id, "Viewer", &u2).await.unwrap_err();
    assert_eq!(err.kind(), "forbidden");

    let err = h.members.link(c.id, u3.id, "Viewer", &outsider).await.unwrap_err();
    assert_eq!(err.kind(), "forbidden");

    let err = h.members.unlink(c.id, u1.id, &u2).await.unwrap_err();
    assert_eq!(err.kind(), "forbidden");

    let err = h
        .members
        .list_members(c.id, &MemberFilter::default(), page(), &u2)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "forbidden");
}

#[tokio::test]
async fn founder_cannot_remove_themselves() {
    let h = Harness::new();
    let u1 = h.user("a@x.com").await;
    let u2 = h.user("b@x.com").await;
    let c = h.company("acme@x.com", &u1).await;

    // A second administrator does not lift the founder rule.
    h.members.link(c.id, u2.id, "Administrator", &u1).await.unwrap();

    let err = h.members.unlink(c.id, u1.id, &u1).await.unwrap_err();
    assert_eq!(err.kind(), "forbidden");
    assert_eq!(err.message(), "cannot remove the founding administrator");
    assert!(h.members.is_linked(u1.id, c.id, None).await.unwrap());
}

#[tokio::test]
async fn last_administrator_cannot_be_removed() {
    let h = Harness::new();
    let u1 = h.user("a@x.com").await;
    let u2 = h.user("b@x.com").await;
    let c = h.company("acme@x.com", &u1).await;
    h.members.link(c.id, u2.id, "Administrator", &u1).await.unwrap();

    // Another administrator may remove the founder while a second admin remains.
    h.members.unlink(c.id, u1.id, &u2).await.unwrap();
    assert!(!h.members.is_linked(u1.id, c.id, None).await.unwrap());

    let err = h.members.unlink(c.id, u2.id, &u2).await.unwrap_err();
    assert_eq!(err.kind(), "forbidden");
    assert!(h
        .members
        .is_linked(u2.id, c.id, Some("Administrator"))
        .await
        .unwrap());
}

#[tokio::test]
async fn unlinking_a_non_member_is_not_found() {
    let h = Harness::new();
    let u1 = h.user("a@x.com").await;
    let u2 = h.user("b@x.com").await;
    let c = h.company("acme@x.com", &u1).await;

    let err = h.members.unlink(c.id, u2.id, &u1).await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn link_by_email_returns_member_view() {
    let mut h = Harness::new();
    let u1 = h.user("a@x.com").await;
    let u2 = h.user("b@x.com").await;
    let c = h.company("acme@x.com", &u1).await;

    let member = h
        .members
        .link_by_email(c.id, "b@x.com", "Viewer", &u1)
        .await
        .unwrap();
    assert_eq!(member.user.id, u2.id);
    assert_eq!(member.role_name, "Viewer");

    let err = h
        .members
        .link_by_email(c.id, "nobody@x.com", "Viewer", &u1)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");

    match h.drain().as_slice() {
        [Notification::CompanyInvite { email, role_name, invited_by, .. }] => {
            assert_eq!(email, "b@x.com");
            assert_eq!(role_name, "Viewer");
            assert_eq!(invited_by, "a@x.com");
        }
        other => panic!("unexpected notifications: {other:?}"),
    }
}

#[tokio::test]
async fn member_and_company_listings() {
    let h = Harness::new();
    let u1 = h.user("a@x.com").await;
    let u2 = h.user("bob@x.com").await;
    let u3 = h.user("carol@x.com").await;
    let c = h.company("acme@x.com", &u1).await;
    let other = h.company("globex@x.com", &u2).await;
    h.members.link(c.id, u2.id, "Viewer", &u1).await.unwrap();
    h.members.link(c.id, u3.id, "Viewer", &u1).await.unwrap();

    let all = h
        .members
        .list_members(c.id, &MemberFilter::default(), page(), &u1)
        .await
        .unwrap();
    assert_eq!(all.pagination.total_records, 3);

    let viewers = h
        .members
        .list_members(
            c.id,
            &MemberFilter {
                role_name: Some("view".into()),
                email: Some("CAROL".into()),
                ..MemberFilter::default()
            },
            page(),
            &u1,
        )
        .await
        .unwrap();
    assert_eq!(viewers.records.len(), 1);
    assert_eq!(viewers.records[0].user.id, u3.id);

    let companies = h
        .members
        .list_companies_for_user(u2.id, &UserCompanyFilter::default(), page())
        .await
        .unwrap();
    assert_eq!(companies.pagination.total_records, 2);
    let role_in_other = companies
        .records
        .iter()
        .find(|uc| uc.company.id == other.id)
        .map(|uc| uc.role_name.as_str());
    assert_eq!(role_in_other, Some("Administrator"));
}
