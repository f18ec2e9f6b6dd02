//! Integration tests for the command interpreter.
//!
//! These drive the public API the way a host would: raw keys through
//! feed_str, ex lines through execute, and templates through expand.

use exvi::{
    ErrorKind, ExviError, HostHooks, Interpreter, InterruptToken, LineBuffer, Outcome, ParseKind,
    RegisterContent, TextBuffer, ViState,
};
use std::io::Write;

fn interp(text: &str) -> Interpreter<LineBuffer> {
    Interpreter::new(LineBuffer::from_text(text))
}

// ============================================================================
// Address resolution
// ============================================================================

#[test]
fn resolution_is_deterministic() {
    let mut ed = interp("a\nfoo\nb\nfoo\nc");
    ed.execute("3").unwrap();

    // Same spec, unchanged buffer, same result.
    for _ in 0..2 {
        let out = ed.execute("/foo/=").unwrap();
        assert_eq!(out, Outcome::Output(vec!["4".to_string()]));
    }
}

#[test]
fn offsets_are_not_clamped() {
    let mut ed = interp("a\nb");
    let err = ed.execute("$+3p").unwrap_err();
    assert!(matches!(err, ExviError::AddressOutOfRange(5)));
    assert_eq!(err.kind(), ErrorKind::Resolution);
}

#[test]
fn reversed_range_is_an_error() {
    let mut ed = interp("a\nb\nc\nd\ne\nf\ng\nh\ni\nj\nk\nl");
    let err = ed.execute("10,5p").unwrap_err();
    assert!(matches!(err, ExviError::InvalidRange(_)));
    // The buffer is untouched.
    assert_eq!(ed.buffer().last_line(), 12);
}

#[test]
fn marker_addressing_and_shifting() {
    let mut ed = interp("a\nb\nc\nd\ne");
    ed.execute("4kx").unwrap();

    // Deleting lines above shifts the marker with its text.
    ed.execute("1,2d").unwrap();
    assert_eq!(ed.markers().get('x'), Some(2));
    let out = ed.execute("'xp").unwrap();
    assert_eq!(out, Outcome::Output(vec!["d".to_string()]));

    // Deleting the marked line drops the marker.
    ed.execute("'xd").unwrap();
    assert!(matches!(
        ed.execute("'xp"),
        Err(ExviError::MarkNotSet('x'))
    ));
}

#[test]
fn percent_is_whole_buffer() {
    let mut ed = interp("a\nb\nc");
    let out = ed.execute("%p").unwrap();
    assert_eq!(
        out,
        Outcome::Output(vec!["a".to_string(), "b".to_string(), "c".to_string()])
    );
}

#[test]
fn backward_search_address() {
    let mut ed = interp("foo\nbar\nfoo\nbaz");
    ed.execute("4").unwrap();
    let out = ed.execute("?foo?=").unwrap();
    assert_eq!(out, Outcome::Output(vec!["3".to_string()]));
}

#[test]
fn search_respects_wrapscan() {
    let mut ed = interp("foo\nbar");
    ed.execute("2").unwrap();
    // With wrapscan the search comes back around.
    ed.execute("/foo/=").unwrap();

    ed.execute("set nowrapscan").unwrap();
    ed.execute("2").unwrap();
    assert!(matches!(
        ed.execute("/foo/="),
        Err(ExviError::PatternNotFound(_))
    ));
}

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn parse_round_trip_properties() {
    let mut ed = interp("1\n2\n3\n4\n5\n6\n7\n8\n9\n10");
    let cmd = ed.parse("5,10s/a/b/g", ParseKind::Check).unwrap();
    assert_eq!(cmd.name, "s");
    assert_eq!(cmd.rest, "/a/b/g");
    assert!(cmd.range.is_pair());
}

#[test]
fn check_never_touches_the_buffer() {
    let ed = interp("a");
    // Both resolve against nothing, but syntax checking accepts the
    // first and rejects the second.
    assert!(ed.check("'q,/missing/s/x/y/"));
    assert!(!ed.check("5,,6p"));
}

#[test]
fn address_on_addressless_command_is_rejected() {
    let mut ed = interp("a");
    let err = ed.execute("3quit").unwrap_err();
    assert!(matches!(err, ExviError::UnexpectedAddress(_)));
    assert_eq!(err.kind(), ErrorKind::Parse);
}

// ============================================================================
// Substitute
// ============================================================================

#[test]
fn escaped_delimiter_round_trip() {
    let mut ed = interp("a/b here");
    ed.execute(r"s/a\/b/c/").unwrap();
    assert_eq!(ed.buffer().as_text(), "c here\n");
}

#[test]
fn substitute_flags_compose() {
    let mut ed = interp("Foo foo FOO");
    ed.execute("s/foo/x/gi").unwrap();
    assert_eq!(ed.buffer().as_text(), "x x x\n");
}

#[test]
fn substitute_confirm_callback() {
    struct EveryOther {
        take: bool,
    }
    impl HostHooks for EveryOther {
        fn confirm_substitute(&mut self, _: usize, _: &str, _: (usize, usize)) -> bool {
            self.take = !self.take;
            self.take
        }
    }

    let buffer = LineBuffer::from_text("a a a a");
    let mut ed = Interpreter::with_hooks(buffer, Box::new(EveryOther { take: false }));
    ed.execute("s/a/X/gc").unwrap();
    assert_eq!(ed.buffer().as_text(), "X a X a\n");
}

#[test]
fn substitute_invalid_regex_leaves_range_unchanged() {
    let mut ed = interp("alpha\nbeta");
    let err = ed.execute("1,2s/(/x/").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Regex);
    assert_eq!(ed.buffer().as_text(), "alpha\nbeta\n");
}

#[test]
fn substitute_count_flag_reports_without_mutation() {
    let mut ed = interp("x x\nx");
    let out = ed.execute("%s/x/y/gn").unwrap();
    assert_eq!(out, Outcome::Message("3 matches".to_string()));
    assert_eq!(ed.buffer().as_text(), "x x\nx\n");
}

#[test]
fn repeat_substitute_with_new_flags() {
    let mut ed = interp("a a\na a");
    ed.execute("1s/a/z/").unwrap();
    assert_eq!(ed.buffer().as_text(), "z a\na a\n");
    ed.execute("2&g").unwrap();
    assert_eq!(ed.buffer().as_text(), "z a\nz z\n");
}

// ============================================================================
// Global
// ============================================================================

#[test]
fn global_delete_renumbers_consistently() {
    let mut ed = interp("foo 1\nkeep 2\nfoo 3\nkeep 4\nfoo 5\nkeep 6");
    ed.execute("1,$g/foo/d").unwrap();
    assert_eq!(ed.buffer().as_text(), "keep 2\nkeep 4\nkeep 6\n");
}

#[test]
fn global_substitute_across_matching_lines() {
    let mut ed = interp("a one\nb one\na two");
    ed.execute("g/^a/s/one|two/X/").unwrap();
    assert_eq!(ed.buffer().as_text(), "a X\nb one\na X\n");
}

#[test]
fn vglobal_keeps_matching_lines() {
    let mut ed = interp("keep\ndrop me\nkeep");
    ed.execute("v/^keep/d").unwrap();
    assert_eq!(ed.buffer().as_text(), "keep\nkeep\n");
}

// ============================================================================
// Mode machine
// ============================================================================

#[test]
fn insert_transition_with_hook_exactly_once() {
    #[derive(Default)]
    struct Counter {
        changes: Vec<(ViState, ViState)>,
    }
    struct SharedCounter(std::rc::Rc<std::cell::RefCell<Counter>>);
    impl HostHooks for SharedCounter {
        fn on_mode_change(&mut self, from: ViState, to: ViState) {
            self.0.borrow_mut().changes.push((from, to));
        }
    }

    let counter = std::rc::Rc::new(std::cell::RefCell::new(Counter::default()));
    let buffer = LineBuffer::from_text("x");
    let mut ed = Interpreter::with_hooks(buffer, Box::new(SharedCounter(counter.clone())));

    ed.feed_str("i").unwrap();
    assert_eq!(ed.state(), ViState::Insert);
    ed.feed_str("\u{1b}").unwrap();
    assert_eq!(ed.state(), ViState::Normal);

    let changes = counter.borrow().changes.clone();
    assert_eq!(
        changes,
        vec![
            (ViState::Normal, ViState::Insert),
            (ViState::Insert, ViState::Normal)
        ]
    );
}

#[test]
fn visual_modes_switch_in_place() {
    let mut ed = interp("a\nb\nc");
    ed.feed_str("v").unwrap();
    assert_eq!(ed.state(), ViState::Visual);
    ed.feed_str("V").unwrap();
    assert_eq!(ed.state(), ViState::VisualLine);
    ed.feed_str("\u{16}").unwrap();
    assert_eq!(ed.state(), ViState::VisualBlock);
    ed.feed_str("\u{1b}").unwrap();
    assert_eq!(ed.state(), ViState::Normal);
}

#[test]
fn selection_survives_leaving_visual() {
    let mut ed = interp("a\nb\nc\nd\ne");
    // Anchor at 2, extend to 4, leave visual.
    ed.feed_str("jVjj\u{1b}").unwrap();
    let sel = ed.selection().expect("selection captured");
    assert_eq!((sel.start, sel.end), (2, 4));

    // The captured selection addresses '<,'>.
    ed.execute("'<,'>d").unwrap();
    assert_eq!(ed.buffer().as_text(), "a\ne\n");
}

#[test]
fn self_insert_is_not_a_mode_change() {
    let mut ed = interp("");
    ed.feed_str("iv").unwrap();
    // 'v' self-inserted instead of entering visual mode.
    assert_eq!(ed.state(), ViState::Insert);
    ed.feed_str("\u{1b}").unwrap();
    assert_eq!(ed.buffer().as_text(), "v\n");
}

// ============================================================================
// Macros
// ============================================================================

#[test]
fn macro_roundtrip_matches_live_input() {
    let sequence = "ihello\u{1b}";

    let mut live = interp("");
    live.feed_str(sequence).unwrap();
    let expected = live.buffer().as_text();

    let mut recorded = interp("");
    recorded.feed_str("qa").unwrap();
    recorded.feed_str(sequence).unwrap();
    recorded.feed_str("q").unwrap();

    // Clear what the recording pass itself inserted, then replay.
    let last = recorded.buffer().last_line();
    recorded.buffer_mut().remove_lines(1, last).unwrap();
    recorded.feed_str("@a").unwrap();
    assert_eq!(recorded.buffer().as_text(), expected);
}

#[test]
fn macro_uppercase_appends_lowercase_overwrites() {
    let mut ed = interp("x\nx\nx");
    ed.feed_str("qa:1d\nq").unwrap();
    ed.feed_str("qA:1d\nq").unwrap();
    assert_eq!(ed.registers().get('a').unwrap().text, ":1d\n:1d\n");

    ed.feed_str("qa:$\nq").unwrap();
    assert_eq!(ed.registers().get('a').unwrap().text, ":$\n");
}

#[test]
fn macro_repeat_count_applies() {
    let mut ed = interp("seed");
    ed.feed_str("qm:$co$\nq").unwrap();
    assert_eq!(ed.buffer().last_line(), 2);
    ed.feed_str("4@m").unwrap();
    assert_eq!(ed.buffer().last_line(), 6);
}

#[test]
fn macro_cycle_is_rejected() {
    let mut ed = interp("a\nb\nc\nd\ne\nf\ng\nh");
    // m deletes a line and calls n; n calls m again. The cycle is
    // caught when n re-enters a register still on the stack.
    ed.registers_mut()
        .set('m', RegisterContent::chars(":1d\n@n".to_string()));
    ed.registers_mut()
        .set('n', RegisterContent::chars("@m".to_string()));

    let err = ed.feed_str("@m").unwrap_err();
    assert!(matches!(err, ExviError::MacroActive('m')));
    // The delete before the failure stuck.
    assert_eq!(ed.buffer().last_line(), 7);
}

#[test]
fn macro_depth_limit_is_enforced() {
    let mut ed = interp("a\nb\nc\nd");
    ed.execute("set maxdepth=1").unwrap();
    ed.registers_mut()
        .set('m', RegisterContent::chars(":1d\n".to_string()));
    ed.registers_mut()
        .set('n', RegisterContent::chars("@m".to_string()));

    // n occupies the only stack slot; playing m from inside it trips
    // the limit.
    let err = ed.feed_str("@n").unwrap_err();
    assert!(matches!(err, ExviError::RecursionLimit(1)));
    assert_eq!(err.kind(), ErrorKind::Recursion);
}

#[test]
fn play_while_recording_is_rejected() {
    let mut ed = interp("a\nb");
    ed.registers_mut()
        .set('m', RegisterContent::chars(":1d\n".to_string()));
    ed.feed_str("qn").unwrap();
    let err = ed.feed_str("@m").unwrap_err();
    assert!(matches!(err, ExviError::AlreadyRecording));
}

#[test]
fn macro_failure_keeps_partial_effects() {
    let mut ed = interp("a\nb\nc");
    ed.feed_str("qm:1d\nq").unwrap();
    assert_eq!(ed.buffer().last_line(), 2);

    // Five repeats only have two lines to delete.
    assert!(ed.feed_str("5@m").is_err());
    assert_eq!(ed.buffer().last_line(), 0);
}

// ============================================================================
// Templates
// ============================================================================

#[test]
fn template_expansion_through_hooks() {
    struct Vars;
    impl HostHooks for Vars {
        fn resolve_variable(&mut self, name: &str) -> Option<String> {
            match name {
                "author" => Some("jo".to_string()),
                _ => None,
            }
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join("header")).unwrap();
    write!(file, "written by @author@").unwrap();

    let mut ed = Interpreter::with_hooks(LineBuffer::new(), Box::new(Vars));
    ed.options_mut().template_dir = Some(dir.path().to_path_buf());

    assert_eq!(ed.expand("header").unwrap(), "written by jo");
}

#[test]
fn template_failure_produces_no_text() {
    struct NoVars;
    impl HostHooks for NoVars {}

    let dir = tempfile::tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join("broken")).unwrap();
    write!(file, "ok so far @nope@").unwrap();

    let mut ed = Interpreter::with_hooks(LineBuffer::new(), Box::new(NoVars));
    ed.options_mut().template_dir = Some(dir.path().to_path_buf());

    let err = ed.expand("broken").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Template);
    let err = ed.expand("missing").unwrap_err();
    assert!(matches!(err, ExviError::TemplateNotFound(_)));
}

// ============================================================================
// Interruption
// ============================================================================

#[test]
fn interruption_discipline() {
    let mut token = InterruptToken::new();
    assert!(token.start());
    assert!(!token.start());
    assert!(token.cancel());
    assert!(!token.cancel());
    assert!(token.start());
    token.stop();
    assert!(!token.is_running());
}

#[test]
fn interrupt_token_lives_on_the_interpreter() {
    let mut ed = interp("a");
    assert!(ed.interrupt_mut().start());
    assert!(ed.interrupt_mut().cancel());
    assert!(ed.interrupt_mut().is_cancelled());
}

// ============================================================================
// Register persistence surface
// ============================================================================

#[test]
fn stores_iterate_for_host_persistence() {
    let mut ed = interp("a\nb");
    ed.execute("1y r").unwrap();
    ed.execute("2ks").unwrap();

    let regs: Vec<char> = ed.registers().iter().map(|(k, _)| k).collect();
    assert!(regs.contains(&'r'));
    let marks: Vec<(char, usize)> = ed.markers().iter().collect();
    assert_eq!(marks, vec![('s', 2)]);
}
