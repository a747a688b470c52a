//! Seeded in-memory database shared by store and service tests.

use chrono::NaiveDateTime;
use rusqlite::Connection;

use super::*;
use crate::db::sqlite::open_memory_database;
use crate::db::store::SqliteTrackerStore;
use crate::models::enums::*;
use crate::models::sharing::{ACCESS_FULL, ACCESS_METADATA_READ_WRITE};
use crate::models::user::authorities;
use crate::models::*;

pub fn at(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// Root with districts A and B; Alice lives in A, Bob in B.
///
/// Enrollments (by id): 1 Alice/open, 2 Bob/open, 3 Alice/protected (owned by
/// district B), 4 Alice/open deleted, 5 Bob/hidden program. Events 1-3 belong
/// to enrollment 1. Relationships: Bob -> enrollment 1 (readable, deleted,
/// hidden type) and event 1 -> Alice (readable, deleted).
pub struct World {
    pub conn: Connection,
}

impl World {
    pub const OU_ROOT: &'static str = "RootOuAAAAA";
    pub const OU_DISTRICT_A: &'static str = "DistrictAAA";
    pub const OU_DISTRICT_B: &'static str = "DistrictBBB";
    pub const OU_FACILITY_A: &'static str = "FacilityAAA";

    pub const TE_TYPE: &'static str = "TeTypePerso";
    pub const ATTR_NAME: &'static str = "AttrNameAAA";
    pub const ATTR_SECRET: &'static str = "AttrSecretA";
    pub const ATTR_AGE: &'static str = "AttrAgeAAAA";

    pub const PROGRAM_OPEN: &'static str = "ProgOpenAAA";
    pub const PROGRAM_PROTECTED: &'static str = "ProgProtAAA";
    pub const PROGRAM_HIDDEN: &'static str = "ProgHiddenA";
    pub const PROGRAM_EVENT: &'static str = "ProgEventAA";

    pub const STAGE_OPEN: &'static str = "StageOpenAA";
    pub const STAGE_HIDDEN: &'static str = "StageHidden";
    pub const STAGE_PROTECTED: &'static str = "StageProtAA";

    pub const REL_TYPE: &'static str = "RelTypeAAAA";
    pub const REL_TYPE_HIDDEN: &'static str = "RelTypeHidd";

    pub const TE_ALICE: &'static str = "TeAliceAAAA";
    pub const TE_BOB: &'static str = "TeBobAAAAAA";

    pub const EN_ALICE_OPEN: &'static str = "EnAliceOpen";
    pub const EN_BOB_OPEN: &'static str = "EnBobOpenAA";
    pub const EN_ALICE_PROTECTED: &'static str = "EnAliceProt";
    pub const EN_ALICE_DELETED: &'static str = "EnDeletedAA";
    pub const EN_BOB_HIDDEN: &'static str = "EnBobHidden";

    pub const EV_OPEN: &'static str = "EvOpenAAAAA";
    pub const EV_HIDDEN_STAGE: &'static str = "EvHiddenStg";
    pub const EV_DELETED: &'static str = "EvDeletedAA";

    pub const REL_OPEN: &'static str = "RelOpenAAAA";
    pub const REL_DELETED: &'static str = "RelDeleted1";
    pub const REL_HIDDEN: &'static str = "RelHiddenAA";
    pub const REL_TYPE_EVENT: &'static str = "RelTypeEvnt";
    pub const REL_EVENT: &'static str = "RelEventAAA";
    pub const REL_EVENT_DELETED: &'static str = "RelEventDel";

    pub fn new() -> Self {
        let conn = open_memory_database().unwrap();
        let world = Self { conn };
        world.seed();
        world
    }

    /// Seeded world behind the SQLite store.
    pub fn store() -> SqliteTrackerStore {
        SqliteTrackerStore::from_connection(Self::new().conn)
    }

    fn hierarchy() -> [OrganisationUnit; 4] {
        let root = OrganisationUnit::new(1, Self::OU_ROOT, "Country", None);
        let district_a = OrganisationUnit::new(2, Self::OU_DISTRICT_A, "District A", Some(&root));
        let district_b = OrganisationUnit::new(3, Self::OU_DISTRICT_B, "District B", Some(&root));
        let facility_a =
            OrganisationUnit::new(4, Self::OU_FACILITY_A, "Facility A", Some(&district_a));
        [root, district_a, district_b, facility_a]
    }

    /// Org unit of the seeded hierarchy by UID.
    pub fn unit(uid: &str) -> OrganisationUnit {
        Self::hierarchy().into_iter().find(|ou| ou.uid == uid).unwrap()
    }

    pub fn program(&self, uid: &str) -> Program {
        get_program_by_uid(&self.conn, uid).unwrap().unwrap()
    }

    pub fn tracked_entity(&self, uid: &str) -> TrackedEntity {
        get_tracked_entity_by_uid(&self.conn, uid).unwrap().unwrap()
    }

    pub fn enrollment(&self, uid: &str) -> Enrollment {
        get_enrollment_by_uid(&self.conn, uid).unwrap().unwrap()
    }

    /// Captures in district A only.
    pub fn user_district_a() -> User {
        User::new("UserDistrA1", "district-a").with_capture_scope(vec![Self::unit(Self::OU_DISTRICT_A)])
    }

    /// Captures everywhere below the root.
    pub fn user_root() -> User {
        User::new("UserRootAAA", "root-user").with_capture_scope(vec![Self::unit(Self::OU_ROOT)])
    }

    pub fn superuser() -> User {
        User::new("UserSuperAA", "admin").with_authorities(&[authorities::ALL])
    }

    fn seed(&self) {
        let conn = &self.conn;
        let [root, district_a, district_b, facility_a] = Self::hierarchy();
        for ou in [&root, &district_a, &district_b, &facility_a] {
            insert_org_unit(conn, ou).unwrap();
        }

        let person = TrackedEntityType {
            id: 1,
            uid: Self::TE_TYPE.into(),
            name: "Person".into(),
            sharing: Sharing::with_public(ACCESS_FULL),
        };
        insert_tracked_entity_type(conn, &person).unwrap();

        for (id, uid, confidential) in [
            (1, Self::ATTR_NAME, false),
            (2, Self::ATTR_SECRET, true),
            (3, Self::ATTR_AGE, false),
        ] {
            insert_attribute(
                conn,
                &TrackedEntityAttribute {
                    id,
                    uid: uid.into(),
                    name: uid.into(),
                    confidential,
                },
            )
            .unwrap();
        }

        let programs = [
            (1, Self::PROGRAM_OPEN, ProgramType::WithRegistration, ProgramAccessLevel::Open,
             vec![Self::ATTR_NAME, Self::ATTR_AGE], ACCESS_FULL),
            (2, Self::PROGRAM_PROTECTED, ProgramType::WithRegistration, ProgramAccessLevel::Protected,
             vec![Self::ATTR_NAME], ACCESS_FULL),
            (3, Self::PROGRAM_HIDDEN, ProgramType::WithRegistration, ProgramAccessLevel::Open,
             vec![Self::ATTR_SECRET], ACCESS_METADATA_READ_WRITE),
            (4, Self::PROGRAM_EVENT, ProgramType::WithoutRegistration, ProgramAccessLevel::Open,
             vec![], ACCESS_FULL),
        ];
        for (id, uid, program_type, access_level, attributes, public) in programs {
            let registration = program_type == ProgramType::WithRegistration;
            insert_program(
                conn,
                &Program {
                    id,
                    uid: uid.into(),
                    name: uid.into(),
                    program_type,
                    access_level,
                    tracked_entity_type: registration.then(|| person.clone()),
                    attributes: attributes.into_iter().map(String::from).collect(),
                    sharing: Sharing::with_public(public),
                },
            )
            .unwrap();
        }

        for (id, uid, program, public) in [
            (1, Self::STAGE_OPEN, Self::PROGRAM_OPEN, ACCESS_FULL),
            (2, Self::STAGE_HIDDEN, Self::PROGRAM_OPEN, ACCESS_METADATA_READ_WRITE),
            (3, Self::STAGE_PROTECTED, Self::PROGRAM_PROTECTED, ACCESS_FULL),
        ] {
            insert_program_stage(
                conn,
                &ProgramStage {
                    id,
                    uid: uid.into(),
                    name: uid.into(),
                    program: program.into(),
                    sharing: Sharing::with_public(public),
                },
            )
            .unwrap();
        }

        for (id, uid, public) in [
            (1, Self::REL_TYPE, ACCESS_FULL),
            (2, Self::REL_TYPE_HIDDEN, ACCESS_METADATA_READ_WRITE),
        ] {
            insert_relationship_type(
                conn,
                &RelationshipType {
                    id,
                    uid: uid.into(),
                    name: uid.into(),
                    from_entity: RelationshipEntity::TrackedEntity,
                    to_entity: RelationshipEntity::Enrollment,
                    bidirectional: false,
                    sharing: Sharing::with_public(public),
                },
            )
            .unwrap();
        }

        let value = |attribute: &str, value: &str| TrackedEntityAttributeValue {
            attribute: attribute.into(),
            value: value.into(),
            created: Some(at("2024-01-01 08:00:00")),
            last_updated: Some(at("2024-01-01 08:00:00")),
        };
        let alice = TrackedEntity {
            id: 1,
            uid: Self::TE_ALICE.into(),
            tracked_entity_type: Some(person.clone()),
            org_unit: Some(district_a.clone()),
            created: Some(at("2024-01-01 08:00:00")),
            last_updated: Some(at("2024-01-01 08:00:00")),
            inactive: false,
            deleted: false,
            attribute_values: vec![value(Self::ATTR_NAME, "Alice"), value(Self::ATTR_SECRET, "s3cret")],
        };
        let bob = TrackedEntity {
            id: 2,
            uid: Self::TE_BOB.into(),
            org_unit: Some(district_b.clone()),
            attribute_values: vec![value(Self::ATTR_NAME, "Bob"), value(Self::ATTR_AGE, "42")],
            ..alice.clone()
        };
        insert_tracked_entity(conn, &alice).unwrap();
        insert_tracked_entity(conn, &bob).unwrap();

        let enrollments = [
            (1, Self::EN_ALICE_OPEN, &alice, Self::PROGRAM_OPEN, &district_a, "2024-01-10 09:00:00", false),
            (2, Self::EN_BOB_OPEN, &bob, Self::PROGRAM_OPEN, &district_b, "2024-02-10 09:00:00", false),
            (3, Self::EN_ALICE_PROTECTED, &alice, Self::PROGRAM_PROTECTED, &district_a, "2024-03-10 09:00:00", false),
            (4, Self::EN_ALICE_DELETED, &alice, Self::PROGRAM_OPEN, &district_a, "2024-04-10 09:00:00", true),
            (5, Self::EN_BOB_HIDDEN, &bob, Self::PROGRAM_HIDDEN, &district_b, "2024-05-10 09:00:00", false),
        ];
        for (id, uid, te, program, ou, date, deleted) in enrollments {
            insert_enrollment(
                conn,
                &Enrollment {
                    id,
                    uid: uid.into(),
                    tracked_entity: Some(te.clone()),
                    program: self.program(program),
                    org_unit: ou.clone(),
                    geometry: None,
                    created: Some(at(date)),
                    created_at_client: Some(at(date)),
                    last_updated: Some(at(date)),
                    last_updated_at_client: Some(at(date)),
                    status: EnrollmentStatus::Active,
                    enrollment_date: Some(at(date)),
                    occurred_date: Some(at(date)),
                    follow_up: false,
                    completed_date: None,
                    completed_by: None,
                    stored_by: Some("admin".into()),
                    created_by: Some(UserInfo {
                        uid: "UserSuperAA".into(),
                        username: "admin".into(),
                    }),
                    last_updated_by: None,
                    deleted,
                    notes: if id == 1 {
                        vec![Note {
                            uid: "NoteEnAAAAA".into(),
                            value: "first visit".into(),
                            stored_by: Some("admin".into()),
                            created: Some(at(date)),
                        }]
                    } else {
                        Vec::new()
                    },
                    events: None,
                    relationship_items: None,
                    attributes: None,
                },
            )
            .unwrap();
        }

        create_program_owner(
            conn,
            Self::TE_ALICE,
            Self::PROGRAM_PROTECTED,
            Self::OU_DISTRICT_B,
            at("2024-03-10 09:00:00"),
        )
        .unwrap();

        let alice_open = self.enrollment(Self::EN_ALICE_OPEN);
        let open_stage = get_program_stage_by_uid(conn, Self::STAGE_OPEN).unwrap().unwrap();
        let hidden_stage = get_program_stage_by_uid(conn, Self::STAGE_HIDDEN).unwrap().unwrap();
        let events = [
            (1, Self::EV_OPEN, &open_stage, EventStatus::Completed, "2024-01-15 10:00:00", false),
            (2, Self::EV_HIDDEN_STAGE, &hidden_stage, EventStatus::Active, "2024-01-20 10:00:00", false),
            (3, Self::EV_DELETED, &open_stage, EventStatus::Active, "2024-01-25 10:00:00", true),
        ];
        for (id, uid, stage, status, date, deleted) in events {
            insert_event(
                conn,
                &Event {
                    id,
                    uid: uid.into(),
                    enrollment: Self::EN_ALICE_OPEN.into(),
                    tracked_entity: alice_open.tracked_entity.clone(),
                    program: alice_open.program.clone(),
                    program_stage: stage.clone(),
                    org_unit: district_a.clone(),
                    status,
                    occurred_date: Some(at(date)),
                    scheduled_date: Some(at(date)),
                    geometry: None,
                    created: Some(at(date)),
                    last_updated: Some(at(date)),
                    completed_date: (status == EventStatus::Completed).then(|| at(date)),
                    completed_by: None,
                    stored_by: Some("admin".into()),
                    assigned_user: None,
                    deleted,
                    data_values: vec![DataValue {
                        data_element: "DeWeightAAA".into(),
                        value: "12".into(),
                        stored_by: None,
                        created: None,
                        last_updated: None,
                    }],
                    notes: if id == 1 {
                        vec![Note {
                            uid: "NoteEvAAAAA".into(),
                            value: "weighed".into(),
                            stored_by: None,
                            created: None,
                        }]
                    } else {
                        Vec::new()
                    },
                    relationship_items: None,
                },
            )
            .unwrap();
        }

        let rel_type = get_relationship_type(conn, 1).unwrap().unwrap();
        let hidden_type = get_relationship_type(conn, 2).unwrap().unwrap();
        for (id, uid, rel_type, deleted) in [
            (1, Self::REL_OPEN, &rel_type, false),
            (2, Self::REL_DELETED, &rel_type, true),
            (3, Self::REL_HIDDEN, &hidden_type, false),
        ] {
            insert_relationship(
                conn,
                &Relationship {
                    id,
                    uid: uid.into(),
                    relationship_type: rel_type.clone(),
                    from: RelationshipItem::TrackedEntity(bob.clone()),
                    to: RelationshipItem::Enrollment(Box::new(alice_open.clone())),
                    deleted,
                    created: Some(at("2024-01-12 10:00:00")),
                    created_at_client: None,
                    last_updated: Some(at("2024-01-12 10:00:00")),
                },
            )
            .unwrap();
        }

        let event_type = RelationshipType {
            id: 3,
            uid: Self::REL_TYPE_EVENT.into(),
            name: Self::REL_TYPE_EVENT.into(),
            from_entity: RelationshipEntity::Event,
            to_entity: RelationshipEntity::TrackedEntity,
            bidirectional: false,
            sharing: Sharing::with_public(ACCESS_FULL),
        };
        insert_relationship_type(conn, &event_type).unwrap();
        let weighing = get_event_by_uid(conn, Self::EV_OPEN).unwrap().unwrap();
        for (id, uid, deleted) in [(4, Self::REL_EVENT, false), (5, Self::REL_EVENT_DELETED, true)] {
            insert_relationship(
                conn,
                &Relationship {
                    id,
                    uid: uid.into(),
                    relationship_type: event_type.clone(),
                    from: RelationshipItem::Event(Box::new(weighing.clone())),
                    to: RelationshipItem::TrackedEntity(alice.clone()),
                    deleted,
                    created: Some(at("2024-01-16 10:00:00")),
                    created_at_client: None,
                    last_updated: Some(at("2024-01-16 10:00:00")),
                },
            )
            .unwrap();
        }
    }
}
