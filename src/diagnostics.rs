//! Structured event log for the shrinker passes.
//!
//! The shrinker does not log through a logging facade. Every pass records structured
//! [`Event`]s into a shared [`EventLog`] instead: what was rewritten, what was skipped and
//! why, and which diagnostics fired. The log is append-only and thread-safe, so passes
//! running on a worker pool can record without coordination, and the embedding compiler can
//! query or print the log after the passes have joined.

use std::fmt;

/// The kind of change or observation recorded by a pass.
///
/// Kinds are deliberately coarse. The free-form message on the event carries the detail;
/// the kind exists so callers can count and filter without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A message schema was decoded, minimized and spliced back into the IR.
    SchemaRewritten,

    /// A message schema could not be decoded and was left untouched.
    SchemaSkipped,

    /// An enum-value-map class was found dead and its virtual methods were cleared.
    EnumMapRemoved,

    /// A generated extension field was found dead and recorded for removal.
    ExtensionFieldRemoved,

    /// A dead builder's construction site was redirected to the generic builder base.
    BuilderRewritten,

    /// The builder elimination pass disabled itself for this compilation.
    ///
    /// Recorded at most once. Indicates an unsupported protobuf runtime shape rather
    /// than a bug in a specific message.
    BuilderPassDisabled,

    /// A check-cast to the generic message base was narrowed to a concrete message type.
    CheckCastStrengthened,

    /// Debug diagnostic: a registry dispatch method still reads an extension field that
    /// was not recognized as dead and is not covered by the allow-list.
    SurvivingExtensionRead,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::SchemaRewritten => "schema-rewritten",
            EventKind::SchemaSkipped => "schema-skipped",
            EventKind::EnumMapRemoved => "enum-map-removed",
            EventKind::ExtensionFieldRemoved => "extension-field-removed",
            EventKind::BuilderRewritten => "builder-rewritten",
            EventKind::BuilderPassDisabled => "builder-pass-disabled",
            EventKind::CheckCastStrengthened => "check-cast-strengthened",
            EventKind::SurvivingExtensionRead => "surviving-extension-read",
        };
        f.write_str(name)
    }
}

/// A single recorded event.
#[derive(Debug, Clone)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,

    /// The subject the event is about (a type, method or field rendered to text).
    ///
    /// Empty when the event is not about a specific program item, e.g. a pass-wide
    /// disable.
    pub subject: String,

    /// Optional free-form detail.
    pub message: Option<String>,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if !self.subject.is_empty() {
            write!(f, " {}", self.subject)?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

/// Append-only, thread-safe log of pass events.
///
/// Workers record concurrently; the order of events from different workers is not
/// meaningful. Events from a single worker appear in the order they were recorded.
///
/// # Examples
///
/// ```rust
/// use protoshrink::diagnostics::{EventKind, EventLog};
///
/// let log = EventLog::new();
/// log.record(EventKind::SchemaSkipped)
///     .subject("Lcom/example/Foo;")
///     .message("info operand is not a constant string");
/// assert_eq!(log.count(EventKind::SchemaSkipped), 1);
/// ```
#[derive(Debug, Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Starts recording an event of the given kind.
    ///
    /// The returned recorder commits the event when dropped, so a bare
    /// `log.record(kind)` records an event with no subject or message.
    pub fn record(&self, kind: EventKind) -> EventRecorder<'_> {
        EventRecorder {
            log: self,
            event: Some(Event {
                kind,
                subject: String::new(),
                message: None,
            }),
        }
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Counts the events of one kind.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Returns `true` if at least one event of the given kind was recorded.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|(_, e)| e.kind == kind)
    }

    /// Iterates over all recorded events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Calls a closure for every event of one kind.
    pub fn for_each<F>(&self, kind: EventKind, mut f: F)
    where
        F: FnMut(&Event),
    {
        for (_, event) in self.events.iter() {
            if event.kind == kind {
                f(event);
            }
        }
    }
}

/// Builder for a single event, committed on drop.
///
/// Returned by [`EventLog::record`]. Both setters are optional.
pub struct EventRecorder<'a> {
    log: &'a EventLog,
    event: Option<Event>,
}

impl EventRecorder<'_> {
    /// Sets the subject of the event.
    pub fn subject(mut self, subject: impl fmt::Display) -> Self {
        if let Some(event) = &mut self.event {
            event.subject = subject.to_string();
        }
        self
    }

    /// Sets the free-form detail message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        if let Some(event) = &mut self.event {
            event.message = Some(message.into());
        }
        self
    }
}

impl Drop for EventRecorder<'_> {
    fn drop(&mut self) {
        if let Some(event) = self.event.take() {
            self.log.events.push(event);
        }
    }
}
