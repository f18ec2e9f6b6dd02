//! The command interpreter.
//!
//! This module ties the pieces together: raw input flows through
//! `feed_char`, the single path shared by live keystrokes and macro
//! playback. Mode transitions come from the table in `vi`; everything
//! else falls to the normal-mode key parser or, inside an ex line, to
//! the ex parser and the dispatch below.

use crate::buffer::{Selection, TextBuffer};
use crate::error::{ExviError, Result};
use crate::ex::address::{parse_address, scan_pattern, ResolveCtx};
use crate::ex::parser::{parse_ex, ParseKind};
use crate::ex::{Arity, Command, CommandKind};
use crate::interrupt::InterruptToken;
use crate::macros::MacroEngine;
use crate::normal::{NormalAction, NormalParser};
use crate::options::Options;
use crate::search::FindState;
use crate::store::{Markers, RegisterContent, Registers};
use crate::substitute::{self, SubstituteFlags, SubstituteSpec, Substitutor};
use crate::template::{self, VariableResolver};
use crate::vi::{Hook, ViKey, ViMachine, ViState};

/// What a command produced, for the host to surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to report.
    Continue,
    /// A status message.
    Message(String),
    /// Lines of output (print commands).
    Output(Vec<String>),
    /// The host should shut the session down.
    Quit,
}

/// Host callbacks. Every method has a safe default, so a host
/// implements only what it surfaces.
pub trait HostHooks {
    /// Called after every mode transition.
    fn on_mode_change(&mut self, _from: ViState, _to: ViState) {}

    /// Asked before each substitute replacement when the c flag is set.
    fn confirm_substitute(&mut self, _line: usize, _text: &str, _span: (usize, usize)) -> bool {
        true
    }

    /// Resolve a template variable during expand().
    fn resolve_variable(&mut self, _name: &str) -> Option<String> {
        None
    }
}

/// Hooks that accept everything and report nothing.
pub struct NoopHooks;

impl HostHooks for NoopHooks {}

/// Insert-mode text pending until the mode is left.
#[derive(Debug)]
struct PendingInsert {
    line: usize,
    column: usize,
    text: String,
}

/// The modal command interpreter over a host buffer.
pub struct Interpreter<B: TextBuffer> {
    buffer: B,
    registers: Registers,
    markers: Markers,
    find: FindState,
    options: Options,
    machine: ViMachine,
    normal: NormalParser,
    macros: MacroEngine,
    interrupt: InterruptToken,
    hooks: Box<dyn HostHooks>,
    pending_ex: Option<String>,
    pending_insert: Option<PendingInsert>,
    anchor: Option<usize>,
    selection: Option<Selection>,
    in_global: bool,
}

impl<B: TextBuffer> Interpreter<B> {
    /// Create an interpreter over a buffer.
    pub fn new(buffer: B) -> Self {
        Self::with_hooks(buffer, Box::new(NoopHooks))
    }

    /// Create an interpreter with host hooks.
    pub fn with_hooks(buffer: B, hooks: Box<dyn HostHooks>) -> Self {
        Self {
            buffer,
            registers: Registers::new(),
            markers: Markers::new(),
            find: FindState::new(),
            options: Options::new(),
            machine: ViMachine::new(),
            normal: NormalParser::new(),
            macros: MacroEngine::new(),
            interrupt: InterruptToken::new(),
            hooks,
            pending_ex: None,
            pending_insert: None,
            anchor: None,
            selection: None,
            in_global: false,
        }
    }

    /// Current mode.
    pub fn state(&self) -> ViState {
        self.machine.state()
    }

    /// The buffer.
    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    /// The buffer, mutably. Host edits through this should be followed
    /// by marker adjustment if they are structural.
    pub fn buffer_mut(&mut self) -> &mut B {
        &mut self.buffer
    }

    /// Give the buffer back.
    pub fn into_buffer(self) -> B {
        self.buffer
    }

    /// The register store.
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// The register store, mutably, for host-side persistence loads.
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    /// The marker store.
    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    /// The marker store, mutably, for host-side persistence loads.
    pub fn markers_mut(&mut self) -> &mut Markers {
        &mut self.markers
    }

    /// Interpreter options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Interpreter options, mutably.
    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    /// The cancellation token for host operations.
    pub fn interrupt_mut(&mut self) -> &mut InterruptToken {
        &mut self.interrupt
    }

    /// The captured visual selection, if any.
    pub fn selection(&self) -> Option<Selection> {
        self.effective_selection()
    }

    /// Feed one raw input character through the interpreter. This is
    /// the same path macro playback uses.
    pub fn feed_char(&mut self, c: char) -> Result<Outcome> {
        let key = ViKey::from_char(c);

        // Verbatim capture while recording; the q that closes the
        // recording is the one key never captured.
        if self.macros.is_recording() && !self.is_stop_record_key(key) {
            self.macros.capture(c);
        }

        if self.pending_ex.is_some() {
            return self.feed_ex_key(key);
        }

        if let Some(entry) = self.machine.find(key) {
            // The hook runs strictly before the state flips.
            let from = self.machine.state();
            let to = entry.to;
            self.run_hook(entry.hook)?;
            self.machine.apply(entry);
            self.hooks.on_mode_change(from, to);
            return Ok(Outcome::Continue);
        }

        match self.machine.state() {
            ViState::Insert => {
                if self.pending_insert.is_none() {
                    self.pending_insert = Some(PendingInsert {
                        line: self.buffer.current_line(),
                        column: self.buffer.current_column(),
                        text: String::new(),
                    });
                }
                if let Some(pending) = self.pending_insert.as_mut() {
                    pending.text.push(key.to_char());
                }
                Ok(Outcome::Continue)
            }
            _ => self.normal_key(key),
        }
    }

    /// Feed a whole string of input. Returns the outcome of the last
    /// character.
    pub fn feed_str(&mut self, input: &str) -> Result<Outcome> {
        let mut last = Outcome::Continue;
        for c in input.chars() {
            last = self.feed_char(c)?;
        }
        Ok(last)
    }

    /// Execute one ex command line directly, with or without the
    /// leading colon.
    pub fn execute(&mut self, line: &str) -> Result<Outcome> {
        let line = line.strip_prefix(':').unwrap_or(line);
        self.execute_ex(line)
    }

    /// Parse an ex command line. `ParseKind::Check` validates syntax
    /// only and never touches the buffer; `ParseKind::Parse` also
    /// resolves the addresses eagerly, failing if resolution fails.
    pub fn parse(&mut self, line: &str, kind: ParseKind) -> Result<Command> {
        let line = line.strip_prefix(':').unwrap_or(line);
        let cmd = parse_ex(line)?;
        if kind == ParseKind::Parse {
            match cmd.arity() {
                Arity::None => {}
                Arity::One => {
                    let default = self.buffer.current_line();
                    let mut ctx = self.ctx();
                    cmd.range.resolve_single(&mut ctx, default)?;
                }
                Arity::Two => {
                    let mut ctx = self.ctx();
                    cmd.range.resolve(&mut ctx)?;
                }
            }
        }
        Ok(cmd)
    }

    /// True when the line is a syntactically valid command. Never
    /// touches the buffer, so it is safe for speculative validation.
    pub fn check(&self, line: &str) -> bool {
        let line = line.strip_prefix(':').unwrap_or(line);
        parse_ex(line).is_ok()
    }

    /// Expand a template through the host's variable resolver.
    pub fn expand(&mut self, name: &str) -> Result<String> {
        let dir = self
            .options
            .template_dir
            .clone()
            .ok_or(ExviError::NoTemplateDir)?;

        struct HookVars<'a>(&'a mut dyn HostHooks);
        impl VariableResolver for HookVars<'_> {
            fn resolve(&mut self, name: &str) -> Option<String> {
                self.0.resolve_variable(name)
            }
        }

        let mut vars = HookVars(self.hooks.as_mut());
        template::expand(&dir, name, &mut vars)
    }

    // ------------------------------------------------------------------
    // Input routing
    // ------------------------------------------------------------------

    fn is_stop_record_key(&self, key: ViKey) -> bool {
        key == ViKey::Char('q')
            && self.pending_ex.is_none()
            && self.machine.state() != ViState::Insert
            && !self.normal.awaiting_argument()
    }

    fn feed_ex_key(&mut self, key: ViKey) -> Result<Outcome> {
        match key {
            ViKey::Char('\n') => {
                let line = self.pending_ex.take().unwrap_or_default();
                self.execute_ex(&line)
            }
            ViKey::Escape => {
                self.pending_ex = None;
                Ok(Outcome::Continue)
            }
            ViKey::Char(c) => {
                if let Some(line) = self.pending_ex.as_mut() {
                    line.push(c);
                }
                Ok(Outcome::Continue)
            }
            ViKey::Ctrl(_) => Ok(Outcome::Continue),
        }
    }

    fn run_hook(&mut self, hook: Hook) -> Result<()> {
        match hook {
            Hook::None => {}
            Hook::BeginInsert => {
                self.pending_insert = Some(PendingInsert {
                    line: self.buffer.current_line(),
                    column: self.buffer.current_column(),
                    text: String::new(),
                });
            }
            Hook::FlushInsert => self.flush_insert()?,
            Hook::BeginVisual => {
                self.anchor = Some(self.buffer.current_line().max(1));
            }
            Hook::CaptureSelection => self.capture_selection(),
            Hook::ExFromVisual => {
                self.capture_selection();
                self.pending_ex = Some("'<,'>".to_string());
            }
        }
        Ok(())
    }

    fn capture_selection(&mut self) {
        let current = self.buffer.current_line().max(1);
        let anchor = self.anchor.take().unwrap_or(current);
        self.selection = Some(Selection::new(anchor, current));
    }

    fn effective_selection(&self) -> Option<Selection> {
        if self.machine.state().is_visual() {
            let current = self.buffer.current_line().max(1);
            Some(Selection::new(self.anchor.unwrap_or(current), current))
        } else {
            self.selection
        }
    }

    /// Commit pending insert text at the position insertion started.
    fn flush_insert(&mut self) -> Result<()> {
        let Some(pending) = self.pending_insert.take() else {
            return Ok(());
        };
        if pending.text.is_empty() {
            return Ok(());
        }

        if self.buffer.is_empty() {
            self.buffer.insert_line(1, "")?;
            self.markers.shift_for_insert(1, 1);
        }
        let line = pending.line.clamp(1, self.buffer.last_line());
        let original = self
            .buffer
            .line_text(line)
            .unwrap_or_default()
            .to_string();
        let split = char_to_byte(&original, pending.column);
        let (head, tail) = original.split_at(split);

        let mut segments = pending.text.split('\n');
        let first = segments.next().unwrap_or_default();
        let rest: Vec<&str> = segments.collect();

        if rest.is_empty() {
            self.buffer
                .replace_line(line, &format!("{}{}{}", head, first, tail))?;
            self.buffer.set_current_line(line);
            self.buffer
                .set_current_column(pending.column + first.chars().count());
        } else {
            self.buffer.replace_line(line, &format!("{}{}", head, first))?;
            let mut at = line;
            for (i, segment) in rest.iter().enumerate() {
                at += 1;
                if i == rest.len() - 1 {
                    self.buffer
                        .insert_line(at, &format!("{}{}", segment, tail))?;
                } else {
                    self.buffer.insert_line(at, segment)?;
                }
            }
            self.markers.shift_for_insert(line + 1, rest.len());
            self.buffer.set_current_line(at);
            self.buffer
                .set_current_column(rest[rest.len() - 1].chars().count());
        }
        Ok(())
    }

    fn normal_key(&mut self, key: ViKey) -> Result<Outcome> {
        match self.normal.push(key, self.macros.is_recording()) {
            NormalAction::Pending => Ok(Outcome::Continue),
            NormalAction::Move { down, count } => {
                self.move_lines(down, count);
                Ok(Outcome::Continue)
            }
            NormalAction::StartEx => {
                self.pending_ex = Some(String::new());
                Ok(Outcome::Continue)
            }
            NormalAction::StartRecord(register) => {
                self.macros.start_record(register, &mut self.registers)?;
                Ok(Outcome::Continue)
            }
            NormalAction::StopRecord => {
                let register = self.macros.stop_record(&mut self.registers)?;
                log::debug!("macro register {:?} closed", register);
                Ok(Outcome::Continue)
            }
            NormalAction::Play { register, count } => self.play_macro(register, count),
            NormalAction::SetMark(name) => {
                let line = self.buffer.current_line();
                if line == 0 {
                    return Err(ExviError::AddressOutOfRange(0));
                }
                self.markers.set(name, line);
                Ok(Outcome::Continue)
            }
            NormalAction::GotoMark(name) => {
                let line = self
                    .markers
                    .get(name)
                    .ok_or(ExviError::MarkNotSet(name))?;
                self.buffer.set_current_line(line);
                Ok(Outcome::Continue)
            }
            NormalAction::Unknown(c) => {
                Err(ExviError::InvalidCommand(format!("unexpected key '{}'", c)))
            }
        }
    }

    fn move_lines(&mut self, down: bool, count: usize) {
        let last = self.buffer.last_line();
        if last == 0 {
            return;
        }
        let current = self.buffer.current_line().max(1);
        let target = if down {
            (current + count).min(last)
        } else {
            current.saturating_sub(count).max(1)
        };
        self.buffer.set_current_line(target);
    }

    /// Start playback and, when this is the outermost invocation, drain
    /// the engine's queued input through the normal input path. Nested
    /// invocations only push their frame; the loop below picks the new
    /// frame up on its next iteration.
    fn play_macro(&mut self, register: char, count: usize) -> Result<Outcome> {
        let outermost = self.macros.begin_play(
            register,
            count,
            &self.registers,
            self.options.max_macro_depth,
        )?;
        if !outermost {
            return Ok(Outcome::Continue);
        }

        while let Some(c) = self.macros.next_input() {
            if let Err(e) = self.feed_char(c) {
                // Stop at the failure; effects already applied stay.
                self.macros.abort();
                return Err(e);
            }
        }
        Ok(Outcome::Continue)
    }

    // ------------------------------------------------------------------
    // Ex dispatch
    // ------------------------------------------------------------------

    fn ctx(&mut self) -> ResolveCtx<'_> {
        let selection = self.effective_selection();
        ResolveCtx {
            buffer: &self.buffer,
            markers: &self.markers,
            find: &mut self.find,
            selection,
            wrapscan: self.options.wrapscan,
            ignorecase: self.options.ignorecase,
        }
    }

    fn execute_ex(&mut self, line: &str) -> Result<Outcome> {
        log::trace!("ex: {:?}", line);
        let cmd = parse_ex(line)?;
        self.dispatch(cmd)
    }

    fn dispatch(&mut self, cmd: Command) -> Result<Outcome> {
        match cmd.kind {
            CommandKind::Goto => {
                let default = self.buffer.current_line();
                let line = {
                    let mut ctx = self.ctx();
                    cmd.range.resolve_single(&mut ctx, default)?
                };
                self.buffer.set_current_line(line);
                Ok(Outcome::Continue)
            }
            CommandKind::Print => self.cmd_print(&cmd, false),
            CommandKind::Number => self.cmd_print(&cmd, true),
            CommandKind::LineNumber => {
                if !cmd.rest.trim().is_empty() {
                    return Err(ExviError::TrailingCharacters(cmd.rest.clone()));
                }
                let default = self.buffer.last_line();
                let line = {
                    let mut ctx = self.ctx();
                    cmd.range.resolve_single(&mut ctx, default)?
                };
                Ok(Outcome::Output(vec![line.to_string()]))
            }
            CommandKind::Delete => self.cmd_delete(&cmd),
            CommandKind::Yank => self.cmd_yank(&cmd),
            CommandKind::Put => self.cmd_put(&cmd),
            CommandKind::Copy => self.cmd_copy(&cmd),
            CommandKind::Move => self.cmd_move(&cmd),
            CommandKind::Join => self.cmd_join(&cmd),
            CommandKind::ShiftRight => self.cmd_shift(&cmd, true),
            CommandKind::ShiftLeft => self.cmd_shift(&cmd, false),
            CommandKind::Substitute => {
                if cmd.rest.is_empty() {
                    return self.repeat_substitute(&cmd, SubstituteFlags::default());
                }
                let spec = substitute::parse_spec(&cmd.rest, self.options.sentinel)?;
                self.run_substitute(&cmd, spec)
            }
            CommandKind::RepeatSubstitute => {
                let flags = SubstituteFlags::parse(cmd.rest.trim())?;
                self.repeat_substitute(&cmd, flags)
            }
            CommandKind::Global { invert } => self.cmd_global(&cmd, invert),
            CommandKind::Mark => self.cmd_mark(&cmd),
            CommandKind::Set => {
                let message = self.options.set(cmd.rest.trim())?;
                Ok(match message {
                    Some(text) => Outcome::Message(text),
                    None => Outcome::Continue,
                })
            }
            CommandKind::Quit { .. } => Ok(Outcome::Quit),
        }
    }

    fn resolve_two(&mut self, cmd: &Command) -> Result<(usize, usize)> {
        let mut ctx = self.ctx();
        cmd.range.resolve(&mut ctx)
    }

    fn cmd_print(&mut self, cmd: &Command, numbered: bool) -> Result<Outcome> {
        let (start, mut end) = self.resolve_two(cmd)?;
        if let Some(count) = parse_optional_count(&cmd.rest)? {
            end = (start + count.max(1) - 1).min(self.buffer.last_line());
        }
        let mut lines = Vec::with_capacity(end - start + 1);
        for n in start..=end {
            let text = self.buffer.line_text(n).unwrap_or_default();
            if numbered {
                lines.push(format!("{:6}  {}", n, text));
            } else {
                lines.push(text.to_string());
            }
        }
        self.buffer.set_current_line(end);
        Ok(Outcome::Output(lines))
    }

    fn cmd_delete(&mut self, cmd: &Command) -> Result<Outcome> {
        let (start, end) = self.resolve_two(cmd)?;
        let (register, count) = parse_register_and_count(&cmd.rest)?;
        let end = match count {
            Some(c) => (start + c.max(1) - 1).min(self.buffer.last_line()),
            None => end,
        };

        let removed = self.buffer.remove_lines(start, end)?;
        let deleted = removed.len();
        self.registers
            .delete(register, RegisterContent::lines(join_lines(&removed)));
        self.markers.shift_for_delete(start, end);

        let last = self.buffer.last_line();
        if last > 0 {
            self.buffer.set_current_line(start.min(last));
        }

        log::debug!("deleted lines {}..={}", start, end);
        if deleted > 1 {
            Ok(Outcome::Message(format!("{} lines deleted", deleted)))
        } else {
            Ok(Outcome::Continue)
        }
    }

    fn cmd_yank(&mut self, cmd: &Command) -> Result<Outcome> {
        let (start, end) = self.resolve_two(cmd)?;
        let (register, count) = parse_register_and_count(&cmd.rest)?;
        let end = match count {
            Some(c) => (start + c.max(1) - 1).min(self.buffer.last_line()),
            None => end,
        };

        let mut lines = Vec::with_capacity(end - start + 1);
        for n in start..=end {
            lines.push(self.buffer.line_text(n).unwrap_or_default().to_string());
        }
        let yanked = lines.len();
        self.registers
            .yank(register, RegisterContent::lines(join_lines(&lines)));

        if yanked > 1 {
            Ok(Outcome::Message(format!("{} lines yanked", yanked)))
        } else {
            Ok(Outcome::Continue)
        }
    }

    fn cmd_put(&mut self, cmd: &Command) -> Result<Outcome> {
        let default = self.buffer.current_line();
        let line = {
            let mut ctx = self.ctx();
            cmd.range.resolve_single(&mut ctx, default)?
        };

        let rest = cmd.rest.trim();
        let register = match rest.chars().next() {
            None => None,
            Some(c) if Registers::is_valid_key(c) && rest.len() == c.len_utf8() => Some(c),
            Some(c) => return Err(ExviError::InvalidRegister(c)),
        };

        let key = register.unwrap_or('"');
        let content = self
            .registers
            .get(key)
            .filter(|c| !c.text.is_empty())
            .ok_or(ExviError::RegisterEmpty(key))?;

        let lines: Vec<String> = split_register_lines(&content.text);
        let count = lines.len();
        for (i, text) in lines.iter().enumerate() {
            self.buffer.insert_line(line + 1 + i, text)?;
        }
        self.markers.shift_for_insert(line + 1, count);
        self.buffer.set_current_line(line + count);
        Ok(Outcome::Continue)
    }

    fn cmd_copy(&mut self, cmd: &Command) -> Result<Outcome> {
        let (start, end) = self.resolve_two(cmd)?;
        let dest = self.resolve_dest(&cmd.rest)?;

        let mut lines = Vec::with_capacity(end - start + 1);
        for n in start..=end {
            lines.push(self.buffer.line_text(n).unwrap_or_default().to_string());
        }
        for (i, text) in lines.iter().enumerate() {
            self.buffer.insert_line(dest + 1 + i, text)?;
        }
        self.markers.shift_for_insert(dest + 1, lines.len());
        self.buffer.set_current_line(dest + lines.len());
        Ok(Outcome::Continue)
    }

    fn cmd_move(&mut self, cmd: &Command) -> Result<Outcome> {
        let (start, end) = self.resolve_two(cmd)?;
        let dest = self.resolve_dest(&cmd.rest)?;
        if dest >= start && dest <= end {
            return Err(ExviError::InvalidRange(format!(
                "move destination {} inside {},{}",
                dest, start, end
            )));
        }

        let removed = self.buffer.remove_lines(start, end)?;
        self.markers.shift_for_delete(start, end);
        let count = removed.len();
        let dest = if dest > end { dest - count } else { dest };
        for (i, text) in removed.iter().enumerate() {
            self.buffer.insert_line(dest + 1 + i, text)?;
        }
        self.markers.shift_for_insert(dest + 1, count);
        self.buffer.set_current_line(dest + count);
        Ok(Outcome::Continue)
    }

    fn cmd_join(&mut self, cmd: &Command) -> Result<Outcome> {
        let (start, mut end) = self.resolve_two(cmd)?;
        if let Some(count) = parse_optional_count(&cmd.rest)? {
            end = (start + count.max(1) - 1).min(self.buffer.last_line());
        }
        if start == end {
            if end >= self.buffer.last_line() {
                return Err(ExviError::AddressOutOfRange(end as i64 + 1));
            }
            end += 1;
        }

        let mut joined = self.buffer.line_text(start).unwrap_or_default().to_string();
        for n in start + 1..=end {
            let next = self.buffer.line_text(n).unwrap_or_default();
            let trimmed = next.trim_start();
            if joined.is_empty() {
                joined.push_str(trimmed);
            } else if !trimmed.is_empty() {
                if !joined.ends_with(' ') {
                    joined.push(' ');
                }
                joined.push_str(trimmed);
            }
        }
        self.buffer.replace_line(start, &joined)?;
        self.buffer.remove_lines(start + 1, end)?;
        self.markers.shift_for_delete(start + 1, end);
        self.buffer.set_current_line(start);
        Ok(Outcome::Continue)
    }

    fn cmd_shift(&mut self, cmd: &Command, right: bool) -> Result<Outcome> {
        let (start, mut end) = self.resolve_two(cmd)?;
        if let Some(count) = parse_optional_count(&cmd.rest)? {
            end = (start + count.max(1) - 1).min(self.buffer.last_line());
        }

        let width = self.options.shiftwidth;
        for n in start..=end {
            let text = self.buffer.line_text(n).unwrap_or_default().to_string();
            let new = if right {
                if text.is_empty() {
                    text
                } else {
                    format!("{}{}", " ".repeat(width), text)
                }
            } else {
                let strip = text
                    .chars()
                    .take(width)
                    .take_while(|c| *c == ' ' || *c == '\t')
                    .count();
                text.chars().skip(strip).collect()
            };
            self.buffer.replace_line(n, &new)?;
        }
        self.buffer.set_current_line(end);
        Ok(Outcome::Continue)
    }

    fn repeat_substitute(&mut self, cmd: &Command, flags: SubstituteFlags) -> Result<Outcome> {
        let (pattern, replacement) = self
            .find
            .last_substitution()
            .map(|(p, r)| (p.to_string(), r.to_string()))
            .ok_or(ExviError::NoPreviousSubstitution)?;
        let spec = SubstituteSpec {
            pattern: Some(pattern),
            replacement,
            flags,
        };
        self.run_substitute(cmd, spec)
    }

    fn run_substitute(&mut self, cmd: &Command, spec: SubstituteSpec) -> Result<Outcome> {
        let pattern = match &spec.pattern {
            Some(p) => p.clone(),
            None => self
                .find
                .last_pattern()
                .ok_or(ExviError::NoPreviousPattern)?
                .to_string(),
        };
        let (start, end) = self.resolve_two(cmd)?;

        // Compile through the find state so the pattern persists for
        // later empty-pattern searches.
        let ignorecase = spec.flags.ignore_case || self.options.ignorecase;
        let regex = self.find.set_pattern(&pattern, ignorecase)?;
        let sub = Substitutor::new(regex, &spec.replacement, spec.flags);

        let mut total = 0;
        let mut last_changed = None;
        for line_no in start..=end {
            let Some(text) = self.buffer.line_text(line_no).map(str::to_string) else {
                continue;
            };
            let (new_text, n) = {
                let hooks = self.hooks.as_mut();
                let mut confirm =
                    |line: usize, text: &str, span: (usize, usize)| {
                        hooks.confirm_substitute(line, text, span)
                    };
                sub.substitute_line(line_no, &text, &mut confirm)
            };
            if n > 0 {
                total += n;
                if !spec.flags.count_only {
                    self.buffer.replace_line(line_no, &new_text)?;
                    last_changed = Some(line_no);
                }
            }
        }

        log::debug!("substitute {:?}: {} replacements", pattern, total);
        if total == 0 {
            return Err(ExviError::PatternNotFound(pattern));
        }
        if spec.flags.count_only {
            return Ok(Outcome::Message(format!("{} matches", total)));
        }

        self.find.set_last_substitution(&pattern, &spec.replacement);
        if let Some(line) = last_changed {
            self.buffer.set_current_line(line);
        }
        if spec.flags.print {
            let line = last_changed.unwrap_or(end);
            let text = self.buffer.line_text(line).unwrap_or_default().to_string();
            return Ok(Outcome::Output(vec![text]));
        }
        if total > 1 {
            Ok(Outcome::Message(format!("{} substitutions", total)))
        } else {
            Ok(Outcome::Continue)
        }
    }

    fn cmd_global(&mut self, cmd: &Command, invert: bool) -> Result<Outcome> {
        if self.in_global {
            return Err(ExviError::NestedGlobal);
        }
        let rest = &cmd.rest;
        let delim = rest.chars().next().ok_or_else(|| {
            ExviError::InvalidCommand("global requires a pattern".to_string())
        })?;
        if delim.is_alphanumeric() || delim == '\\' || delim == ' ' {
            return Err(ExviError::InvalidCommand(format!(
                "bad global delimiter '{}'",
                delim
            )));
        }
        let (pattern, command) = scan_pattern(&rest[delim.len_utf8()..], delim);
        let command = command.trim();
        let command = if command.is_empty() { "p" } else { command };

        let pattern = if pattern.is_empty() {
            self.find
                .last_pattern()
                .ok_or(ExviError::NoPreviousPattern)?
                .to_string()
        } else {
            pattern
        };
        let regex = self.find.set_pattern(&pattern, self.options.ignorecase)?;

        // The default range for a global command is the whole buffer.
        let (start, end) = if cmd.range.is_explicit() {
            self.resolve_two(cmd)?
        } else {
            (1, self.buffer.last_line())
        };

        // Mark matching lines first; the command list may renumber.
        let mut matches = Vec::new();
        for n in start..=end.min(self.buffer.last_line()) {
            if let Some(text) = self.buffer.line_text(n) {
                if regex.is_match(text) != invert {
                    matches.push(n);
                }
            }
        }
        if matches.is_empty() {
            return Err(ExviError::PatternNotFound(pattern));
        }

        log::debug!(
            "global {:?}: {} matching lines, command {:?}",
            pattern,
            matches.len(),
            command
        );
        self.in_global = true;
        let result = self.run_global_body(&matches, command);
        self.in_global = false;

        let output = result?;
        if output.is_empty() {
            Ok(Outcome::Continue)
        } else {
            Ok(Outcome::Output(output))
        }
    }

    /// Run the command list on each marked line, tracking the line-count
    /// delta so later marks stay aimed at the same text as the buffer
    /// renumbers underneath them.
    fn run_global_body(&mut self, matches: &[usize], command: &str) -> Result<Vec<String>> {
        let mut delta: i64 = 0;
        let mut output = Vec::new();
        for &mark in matches {
            let line = mark as i64 + delta;
            let last = self.buffer.last_line() as i64;
            if line < 1 || line > last {
                continue;
            }
            self.buffer.set_current_line(line as usize);
            let before = self.buffer.last_line() as i64;
            match self.execute_ex(command)? {
                Outcome::Output(lines) => output.extend(lines),
                Outcome::Quit => return Ok(output),
                _ => {}
            }
            delta += self.buffer.last_line() as i64 - before;
        }
        Ok(output)
    }

    fn cmd_mark(&mut self, cmd: &Command) -> Result<Outcome> {
        let name = cmd
            .rest
            .trim_start()
            .chars()
            .next()
            .ok_or_else(|| ExviError::InvalidCommand("mark name required".to_string()))?;
        if !name.is_ascii_alphabetic() {
            return Err(ExviError::InvalidCommand(format!(
                "bad mark name '{}'",
                name
            )));
        }
        let default = self.buffer.current_line();
        let line = {
            let mut ctx = self.ctx();
            cmd.range.resolve_single(&mut ctx, default)?
        };
        if line == 0 {
            return Err(ExviError::AddressOutOfRange(0));
        }
        self.markers.set(name, line);
        Ok(Outcome::Continue)
    }

    /// Resolve a copy/move destination. Line 0 is legal here: it places
    /// lines before the first line.
    fn resolve_dest(&mut self, rest: &str) -> Result<usize> {
        let rest = rest.trim();
        if rest.is_empty() {
            return Err(ExviError::InvalidAddress("destination required".to_string()));
        }
        let (spec, leftover) = parse_address(rest)?
            .ok_or_else(|| ExviError::InvalidAddress(rest.to_string()))?;
        if !leftover.trim().is_empty() {
            return Err(ExviError::TrailingCharacters(leftover.to_string()));
        }
        let line = {
            let mut ctx = self.ctx();
            spec.resolve(&mut ctx)?
        };
        if line < 0 || line > self.buffer.last_line() as i64 {
            return Err(ExviError::AddressOutOfRange(line));
        }
        Ok(line as usize)
    }
}

/// Join buffer lines into register text, one newline per line.
fn join_lines(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Split register text back into lines for a put.
fn split_register_lines(text: &str) -> Vec<String> {
    let trimmed = text.strip_suffix('\n').unwrap_or(text);
    trimmed.split('\n').map(|s| s.to_string()).collect()
}

/// Parse the optional register and count arguments of :d and :y.
fn parse_register_and_count(args: &str) -> Result<(Option<char>, Option<usize>)> {
    let args = args.trim();
    if args.is_empty() {
        return Ok((None, None));
    }
    let first = args.chars().next().expect("non-empty");
    if first.is_ascii_alphabetic() {
        let rest = args[first.len_utf8()..].trim();
        let count = if rest.is_empty() {
            None
        } else {
            Some(
                rest.parse()
                    .map_err(|_| ExviError::TrailingCharacters(rest.to_string()))?,
            )
        };
        Ok((Some(first), count))
    } else {
        let count = args
            .parse()
            .map_err(|_| ExviError::TrailingCharacters(args.to_string()))?;
        Ok((None, Some(count)))
    }
}

/// Parse an optional trailing count.
fn parse_optional_count(args: &str) -> Result<Option<usize>> {
    let args = args.trim();
    if args.is_empty() {
        return Ok(None);
    }
    args.parse()
        .map(Some)
        .map_err(|_| ExviError::TrailingCharacters(args.to_string()))
}

/// Byte offset of a character offset, saturating at the end.
fn char_to_byte(s: &str, chars: usize) -> usize {
    s.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
