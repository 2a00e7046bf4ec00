use super::*;
use crate::protocol::JoinBoard;
use crate::state::{DisplayUser, OverlayId, RawAction};
use serde_json::{Map, json};

struct Client {
    session: SessionId,
    rx: mpsc::Receiver<ServerEvent>,
}

impl Client {
    /// Drain everything queued so far.
    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn names(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(ServerEvent::name).collect()
    }
}

fn connect(hub: &mut Hub) -> Client {
    let session = SessionId::new();
    let (tx, rx) = mpsc::channel(64);
    hub.connect(session, tx);
    let mut client = Client { session, rx };
    assert_eq!(client.drain(), vec![ServerEvent::Connected { session_id: session }]);
    client
}

fn join(hub: &mut Hub, client: &Client, board_id: &BoardId, password: Option<&str>) {
    hub.dispatch(
        client.session,
        ClientEvent::JoinBoard(JoinBoard {
            board_id: board_id.clone(),
            user: DisplayUser { name: format!("user-{}", client.session), color: "#ff0000".into() },
            password: password.map(str::to_owned),
        }),
    );
}

fn draw(hub: &mut Hub, client: &Client, board_id: &BoardId, n: u32) {
    let mut payload = Map::new();
    payload.insert("n".into(), json!(n));
    hub.dispatch(
        client.session,
        ClientEvent::DrawAction { board_id: board_id.clone(), action: RawAction::new("pen", payload) },
    );
}

fn error_code(events: &[ServerEvent]) -> Option<&str> {
    events.iter().find_map(|e| match e {
        ServerEvent::Error { code, .. } => Some(code.as_str()),
        _ => None,
    })
}

fn sequence_numbers(events: &[ServerEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::DrawAction(action) => action.payload.get("n").and_then(serde_json::Value::as_u64),
            _ => None,
        })
        .collect()
}

#[test]
fn join_sends_owner_status_init_and_users() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(Some("Plan".into()), None).id;
    let mut a = connect(&mut hub);

    join(&mut hub, &a, &board_id, None);

    let events = a.drain();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], ServerEvent::OwnerStatus { is_owner: true });
    let ServerEvent::BoardInit { board, is_owner } = &events[1] else {
        panic!("expected board-init, got {:?}", events[1]);
    };
    assert!(*is_owner);
    assert_eq!(board.title, "Plan");
    assert!(matches!(&events[2], ServerEvent::UsersUpdate(users) if users.len() == 1));
}

#[test]
fn join_errors_go_to_sender_only() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(None, Some("secret".into())).id;
    let mut a = connect(&mut hub);
    let mut b = connect(&mut hub);
    join(&mut hub, &a, &board_id, Some("secret"));
    a.drain();

    join(&mut hub, &b, &board_id, Some("wrong"));
    assert_eq!(error_code(&b.drain()), Some("E_INVALID_PASSWORD"));
    assert!(a.drain().is_empty());

    join(&mut hub, &b, &BoardId::from("missing"), None);
    assert_eq!(error_code(&b.drain()), Some("E_BOARD_NOT_FOUND"));
}

#[test]
fn peers_receive_actions_in_append_order_without_echo() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(None, None).id;
    let mut a = connect(&mut hub);
    let mut b = connect(&mut hub);
    let mut c = connect(&mut hub);
    for client in [&a, &b, &c] {
        join(&mut hub, client, &board_id, None);
    }
    a.drain();
    b.drain();
    c.drain();

    draw(&mut hub, &a, &board_id, 1);
    draw(&mut hub, &b, &board_id, 2);
    draw(&mut hub, &a, &board_id, 3);
    draw(&mut hub, &c, &board_id, 4);

    assert_eq!(sequence_numbers(&a.drain()), [2, 4]);
    assert_eq!(sequence_numbers(&b.drain()), [1, 3, 4]);
    assert_eq!(sequence_numbers(&c.drain()), [1, 2, 3]);

    let log: Vec<u64> = hub
        .store()
        .get(&board_id)
        .expect("board")
        .actions
        .iter()
        .filter_map(|a| a.payload.get("n").and_then(serde_json::Value::as_u64))
        .collect();
    assert_eq!(log, [1, 2, 3, 4]);
}

#[test]
fn new_joiner_snapshot_equals_full_log() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(None, None).id;
    let a = connect(&mut hub);
    join(&mut hub, &a, &board_id, None);
    for n in 0..5 {
        draw(&mut hub, &a, &board_id, n);
    }

    let mut late = connect(&mut hub);
    join(&mut hub, &late, &board_id, None);

    let events = late.drain();
    let init = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::BoardInit { board, is_owner } => Some((board, *is_owner)),
            _ => None,
        })
        .expect("board-init");
    assert!(!init.1);
    assert_eq!(init.0.data, hub.store().get(&board_id).expect("board").actions);
    assert_eq!(init.0.data.len(), 5);
}

#[test]
fn both_clients_receive_identical_user_lists() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(None, None).id;
    let mut a = connect(&mut hub);
    let mut b = connect(&mut hub);
    join(&mut hub, &a, &board_id, None);
    a.drain();

    join(&mut hub, &b, &board_id, None);

    let last_users = |events: Vec<ServerEvent>| {
        events.into_iter().rev().find_map(|e| match e {
            ServerEvent::UsersUpdate(users) => Some(users),
            _ => None,
        })
    };
    let seen_by_a = last_users(a.drain()).expect("a gets users-update");
    let seen_by_b = last_users(b.drain()).expect("b gets users-update");
    assert_eq!(seen_by_a.len(), 2);
    assert_eq!(seen_by_a, seen_by_b);
}

#[test]
fn owner_disconnect_notifies_only_new_owner() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(None, None).id;
    let owner = connect(&mut hub);
    let mut second = connect(&mut hub);
    let mut third = connect(&mut hub);
    join(&mut hub, &owner, &board_id, None);
    join(&mut hub, &second, &board_id, None);
    join(&mut hub, &third, &board_id, None);
    second.drain();
    third.drain();

    hub.disconnect(owner.session);

    assert_eq!(second.names(), ["owner-status", "users-update"]);
    assert_eq!(third.names(), ["users-update"]);
    assert!(hub.store().get(&board_id).expect("board").is_owner(second.session));
}

#[test]
fn clear_from_non_owner_is_rejected_without_broadcast() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(None, None).id;
    let mut owner = connect(&mut hub);
    let mut guest = connect(&mut hub);
    join(&mut hub, &owner, &board_id, None);
    join(&mut hub, &guest, &board_id, None);
    draw(&mut hub, &owner, &board_id, 1);
    owner.drain();
    guest.drain();

    hub.dispatch(guest.session, ClientEvent::ClearBoard { board_id: board_id.clone() });

    assert_eq!(error_code(&guest.drain()), Some("E_NOT_OWNER"));
    assert!(owner.drain().is_empty());
    assert_eq!(hub.store().get(&board_id).expect("board").actions.len(), 1);
}

#[test]
fn clear_from_owner_reaches_everyone_including_owner() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(None, None).id;
    let mut owner = connect(&mut hub);
    let mut guest = connect(&mut hub);
    join(&mut hub, &owner, &board_id, None);
    join(&mut hub, &guest, &board_id, None);
    draw(&mut hub, &guest, &board_id, 1);
    owner.drain();
    guest.drain();

    hub.dispatch(owner.session, ClientEvent::ClearBoard { board_id: board_id.clone() });

    assert_eq!(owner.drain(), vec![ServerEvent::BoardCleared]);
    assert_eq!(guest.drain(), vec![ServerEvent::BoardCleared]);
    assert!(hub.store().get(&board_id).expect("board").actions.is_empty());
}

#[test]
fn settings_update_is_owner_only_and_broadcast_to_all() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(None, None).id;
    let mut owner = connect(&mut hub);
    let mut guest = connect(&mut hub);
    join(&mut hub, &owner, &board_id, None);
    join(&mut hub, &guest, &board_id, None);
    owner.drain();
    guest.drain();

    let mut partial = Settings::new();
    partial.insert("background".into(), json!("#101010"));
    hub.dispatch(
        guest.session,
        ClientEvent::UpdateBoardSettings { board_id: board_id.clone(), settings: partial.clone() },
    );
    assert_eq!(error_code(&guest.drain()), Some("E_NOT_OWNER"));
    assert!(owner.drain().is_empty());

    hub.dispatch(owner.session, ClientEvent::UpdateBoardSettings { board_id: board_id.clone(), settings: partial });
    for events in [owner.drain(), guest.drain()] {
        let [ServerEvent::SettingsUpdate(settings)] = events.as_slice() else {
            panic!("expected one settings-update, got {events:?}");
        };
        assert_eq!(settings.get("background"), Some(&json!("#101010")));
        assert_eq!(settings.get("gridEnabled"), Some(&json!(true)));
    }
}

#[test]
fn cursor_moves_reach_peers_and_do_not_count_as_activity() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(None, None).id;
    let mut a = connect(&mut hub);
    let mut b = connect(&mut hub);
    join(&mut hub, &a, &board_id, None);
    join(&mut hub, &b, &board_id, None);
    a.drain();
    b.drain();
    hub.store_mut().get_mut(&board_id).expect("board").last_activity = 0;

    let cursor = crate::state::Cursor { x: 12.5, y: -3.0 };
    hub.dispatch(a.session, ClientEvent::CursorMove { board_id: board_id.clone(), cursor });

    assert!(a.drain().is_empty());
    let events = b.drain();
    let [ServerEvent::CursorUpdate { user_id, user, cursor: seen }] = events.as_slice() else {
        panic!("expected cursor-update, got {events:?}");
    };
    assert_eq!(*user_id, a.session);
    assert_eq!(user.cursor, cursor);
    assert_eq!(*seen, cursor);
    assert_eq!(hub.store().get(&board_id).expect("board").last_activity, 0);
}

#[test]
fn unjoined_session_actions_are_rejected() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(None, None).id;
    let mut member = connect(&mut hub);
    let mut outsider = connect(&mut hub);
    join(&mut hub, &member, &board_id, None);
    member.drain();

    draw(&mut hub, &outsider, &board_id, 1);
    assert_eq!(error_code(&outsider.drain()), Some("E_UNJOINED"));

    hub.dispatch(
        outsider.session,
        ClientEvent::CursorMove { board_id: board_id.clone(), cursor: crate::state::Cursor::default() },
    );
    assert!(outsider.drain().is_empty());
    assert!(member.drain().is_empty());
    assert!(hub.store().get(&board_id).expect("board").actions.is_empty());
}

#[test]
fn sticky_note_lifecycle_broadcasts_to_peers_only() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(None, None).id;
    let mut a = connect(&mut hub);
    let mut b = connect(&mut hub);
    join(&mut hub, &a, &board_id, None);
    join(&mut hub, &b, &board_id, None);
    a.drain();
    b.drain();

    let note_id = OverlayId::from(1_712_345_678_901_u64);
    let mut note = Map::new();
    note.insert("id".into(), json!(1_712_345_678_901_u64));
    note.insert("text".into(), json!("ship it"));
    hub.dispatch(a.session, ClientEvent::AddStickyNote { board_id: board_id.clone(), note });

    let mut patch = Map::new();
    patch.insert("text".into(), json!("shipped"));
    hub.dispatch(
        a.session,
        ClientEvent::UpdateStickyNote {
            board_id: board_id.clone(),
            note: crate::protocol::NotePatch { id: note_id.clone(), payload: patch },
        },
    );
    hub.dispatch(a.session, ClientEvent::DeleteStickyNote { board_id: board_id.clone(), note_id: note_id.clone() });

    assert!(a.drain().is_empty());
    assert_eq!(b.names(), ["sticky-note-added", "sticky-note-updated", "sticky-note-deleted"]);

    hub.dispatch(a.session, ClientEvent::DeleteStickyNote { board_id, note_id });
    assert_eq!(error_code(&a.drain()), Some("E_NOTE_NOT_FOUND"));
}

#[test]
fn comments_broadcast_to_peers_only() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(None, None).id;
    let mut a = connect(&mut hub);
    let mut b = connect(&mut hub);
    join(&mut hub, &a, &board_id, None);
    join(&mut hub, &b, &board_id, None);
    a.drain();
    b.drain();

    let mut comment = Map::new();
    comment.insert("text".into(), json!("why red?"));
    hub.dispatch(b.session, ClientEvent::AddComment { board_id: board_id.clone(), comment });
    let events = a.drain();
    let [ServerEvent::CommentAdded(added)] = events.as_slice() else {
        panic!("expected comment-added, got {events:?}");
    };

    hub.dispatch(b.session, ClientEvent::DeleteComment { board_id, comment_id: added.id.clone() });
    assert_eq!(a.drain(), vec![ServerEvent::CommentDeleted { id: added.id.clone() }]);
    assert!(b.drain().is_empty());
}

#[test]
fn settings_title_renames_board_for_summary_and_new_joiners() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(Some("Old".into()), None).id;
    let mut owner = connect(&mut hub);
    join(&mut hub, &owner, &board_id, None);
    owner.drain();

    let mut settings = Settings::new();
    settings.insert("title".into(), json!("Renamed"));
    hub.dispatch(owner.session, ClientEvent::UpdateBoardSettings { board_id: board_id.clone(), settings });
    assert!(error_code(&owner.drain()).is_none());

    assert_eq!(hub.board_summary(&board_id).expect("summary").title, "Renamed");

    let mut late = connect(&mut hub);
    join(&mut hub, &late, &board_id, None);
    let events = late.drain();
    let Some(ServerEvent::BoardInit { board, .. }) = events.iter().find(|e| matches!(e, ServerEvent::BoardInit { .. })) else {
        panic!("expected board-init, got {events:?}");
    };
    assert_eq!(board.title, "Renamed");
}

#[test]
fn rejoining_same_board_updates_display_name() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(None, None).id;
    let mut a = connect(&mut hub);
    let mut b = connect(&mut hub);
    join(&mut hub, &a, &board_id, None);
    join(&mut hub, &b, &board_id, None);
    a.drain();
    b.drain();

    hub.dispatch(
        a.session,
        ClientEvent::JoinBoard(JoinBoard {
            board_id: board_id.clone(),
            user: DisplayUser { name: "Grace".into(), color: "#00ff00".into() },
            password: None,
        }),
    );

    let events = b.drain();
    let [ServerEvent::UsersUpdate(users)] = events.as_slice() else {
        panic!("expected users-update, got {events:?}");
    };
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].id, a.session);
    assert_eq!(users[0].name, "Grace");
    assert_eq!(users[0].color, "#00ff00");
}

#[test]
fn disconnected_session_gets_nothing_further() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(None, None).id;
    let a = connect(&mut hub);
    let mut b = connect(&mut hub);
    join(&mut hub, &a, &board_id, None);
    join(&mut hub, &b, &board_id, None);
    b.drain();

    hub.disconnect(b.session);
    draw(&mut hub, &a, &board_id, 1);
    draw(&mut hub, &b, &board_id, 2);

    assert!(b.drain().is_empty());
    assert_eq!(hub.store().get(&board_id).expect("board").actions.len(), 1);
}

#[test]
fn events_for_reaped_board_report_not_found() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(None, None).id;
    let mut a = connect(&mut hub);
    join(&mut hub, &a, &board_id, None);
    a.drain();
    hub.store_mut().get_mut(&board_id).expect("board").last_activity = 0;

    let evicted = hub.reap(now_ms(), Duration::from_secs(48 * 60 * 60));
    assert_eq!(evicted, vec![board_id.clone()]);

    draw(&mut hub, &a, &board_id, 1);
    assert_eq!(error_code(&a.drain()), Some("E_BOARD_NOT_FOUND"));
    hub.disconnect(a.session);
}

#[test]
fn reap_keeps_boards_touched_within_ttl() {
    let mut hub = Hub::new();
    let stale = hub.create_board(None, None).id;
    let fresh = hub.create_board(None, None).id;
    let ttl = Duration::from_secs(48 * 60 * 60);
    let now = now_ms();
    hub.store_mut().get_mut(&stale).expect("stale").last_activity = now - 49 * 60 * 60 * 1000;
    hub.store_mut().get_mut(&fresh).expect("fresh").last_activity = now - 47 * 60 * 60 * 1000;

    assert_eq!(hub.reap(now, ttl), vec![stale.clone()]);
    assert!(!hub.store().contains(&stale));
    assert!(hub.store().contains(&fresh));
}

#[test]
fn board_summary_reports_counts_without_password() {
    let mut hub = Hub::new();
    let board_id = hub.create_board(Some("Ops".into()), Some("pw".into())).id;
    let a = connect(&mut hub);
    join(&mut hub, &a, &board_id, Some("pw"));
    draw(&mut hub, &a, &board_id, 1);

    let summary = hub.board_summary(&board_id).expect("summary");
    assert!(summary.has_password);
    assert_eq!(summary.user_count, 1);
    assert_eq!(summary.data.len(), 1);
    let json = serde_json::to_value(&summary).expect("serialize");
    assert!(json.get("userCount").is_some());
    assert!(!json.to_string().contains("\"pw\""));
}

#[test]
fn shutdown_command_stops_the_hub() {
    let mut hub = Hub::new();
    hub.create_board(None, None);
    assert!(hub.handle(Command::Shutdown).is_break());
    assert!(hub.store().is_empty());
}

#[tokio::test]
async fn handle_round_trips_through_the_actor() {
    let (hub, task) = spawn_hub(8);
    let created = hub.create_board(None, Some("secret".into())).await.expect("create");

    let denied = hub.check_join(created.id.clone(), Some("nope".into())).await;
    assert!(matches!(denied, Err(HubError::Session(SessionError::InvalidPassword))));
    hub.check_join(created.id.clone(), Some("secret".into()))
        .await
        .expect("password accepted");

    hub.shutdown().await;
    task.await.expect("hub task joins");
    assert!(matches!(hub.create_board(None, None).await, Err(HubError::Unavailable)));
}
