//! Integration tests driving the rules engine and the variation tree
//! together, the way a viewer front end would: click moves in, wander the
//! tree, paste a PGN, prune lines.

use chessglass::rules::{nice_string, parse_algebraic, pgn, Move, Position};
use chessglass::tree::Tree;
use chessglass::START_FEN;

fn mv(s: &str) -> Move {
    Move::from_uci(s).unwrap()
}

#[test]
fn clicked_moves_are_vetted_then_applied() {
    let mut tree = Tree::default();

    // The board only forwards moves that pass the legality check.
    let pos = tree.current_position().clone();
    assert!(pos.illegal_reason(mv("e2e4")).is_none());
    tree.apply_move_from_current(mv("e2e4"));

    let pos = tree.current_position().clone();
    assert_eq!(
        pos.illegal_reason(mv("e2e4")),
        Some("no piece of the side to move on the source square")
    );
    assert!(pos.illegal_reason(mv("e7e5")).is_none());
    tree.apply_move_from_current(mv("e7e5"));
    tree.apply_move_from_current(mv("g1f3"));

    assert_eq!(
        tree.current_position().to_fen(),
        "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2"
    );
}

#[test]
fn tree_history_feeds_the_engine_position_command() {
    let mut tree = Tree::default();
    tree.make_move_sequence(&[mv("e2e4"), mv("c7c5"), mv("g1f3")]);

    let history: Vec<String> = tree
        .history(tree.current_id())
        .iter()
        .map(|m| m.to_string())
        .collect();
    assert_eq!(history.join(" "), "e2e4 c7c5 g1f3");
    assert_eq!(tree.position(tree.root_id()).unwrap().to_fen(), START_FEN);
}

#[test]
fn pasted_pgn_becomes_a_line_in_the_tree() {
    let text = r#"[Event "Test"]
[White "Someone"]

1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 4. Ba4 Nf6 5. O-O 1/2-1/2"#;

    let game = pgn::import(text).unwrap();
    let mut tree = Tree::default();
    assert!(tree.make_move_sequence(&game.moves));

    assert_eq!(tree.node_count(), game.moves.len() + 1);
    assert_eq!(tree.version(), 1);
    // White castled last; the king ended up on g1.
    let fen = tree.current_position().to_fen();
    assert!(fen.contains("RK1"), "unexpected final fen: {fen}");
}

#[test]
fn variations_prune_down_to_the_promoted_line() {
    let mut tree = Tree::default();

    // Main line and two side lines off the first move.
    tree.make_move_sequence(&[mv("e2e4"), mv("e7e5"), mv("g1f3")]);
    tree.goto_root();
    tree.next(); // at e4
    tree.apply_move_from_current(mv("c7c5"));
    tree.apply_move_from_current(mv("g1f3"));
    tree.prev();
    tree.apply_move_from_current(mv("b1c3"));

    // Stand in the Sicilian line and make it the main line, then cut the
    // rest away. What remains is a single chain through the current node.
    assert!(tree.delete_other_lines());
    let depth = tree.history(tree.current_id()).len();
    assert_eq!(tree.node_count(), depth + 1);
    assert_eq!(
        tree.history(tree.current_id()),
        vec![mv("e2e4"), mv("c7c5"), mv("b1c3")]
    );
}

#[test]
fn display_strings_follow_the_position() {
    let mut tree = Tree::default();
    let mut rendered = Vec::new();
    for s in ["e2e4", "c7c5", "g1f3", "d7d6", "f1b5"] {
        let pos = tree.current_position().clone();
        rendered.push(nice_string(&pos, mv(s)));
        tree.apply_move_from_current(mv(s));
    }
    // Checks are not marked.
    assert_eq!(rendered, vec!["e4", "c5", "Nf3", "d6", "Bb5"]);
}

#[test]
fn typed_tokens_resolve_against_the_current_node() {
    let mut tree = Tree::default();
    for token in ["e4", "e5", "Nf3", "Nc6", "Bb5"] {
        let pos = tree.current_position().clone();
        let m = parse_algebraic(&pos, token).unwrap();
        tree.apply_move_from_current(m);
    }
    assert_eq!(
        tree.current_position().to_fen(),
        "r1bqkbnr/pppp1ppp/2n5/1B2p3/4P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3"
    );
}

#[test]
fn fen_round_trip_through_the_tree_root() {
    let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 4 30";
    let mut tree = Tree::new(Position::from_fen(fen).unwrap());
    assert_eq!(tree.current_position().to_fen(), fen);
    tree.apply_move_from_current(mv("e1g1"));
    tree.prev();
    assert_eq!(tree.current_position().to_fen(), fen);
}
