//! Command dispatcher.
//!
//! A request line is matched against an ordered list of grammars; the first
//! grammar that matches wins and its handler produces the reply. Order is
//! declaration order, so a specific form (`vm.memory[<vm>,total]`) must be
//! registered before a general one that would also match it. Unmatched lines
//! get the `ZBX_NOTSUPPORTED` sentinel.
//!
//! A grammar is a literal key plus a fixed list of bracketed, comma-separated
//! arguments, optionally preceded by a `ZBXD` framing token which is ignored.

use crate::error::{Result, VmbixError};
use crate::observability::metrics as vmbix_metrics;
use async_trait::async_trait;
use regex::Regex;
use std::time::Instant;
use tracing::{debug, error, info};

/// Reply for commands no grammar matches.
pub const NOT_SUPPORTED: &str = "ZBX_NOTSUPPORTED";

/// Tolerated framing token ahead of the key.
const FRAMING_PREFIX: &str = r"^(?:\s*ZBXD.)?\s*";

/// One bracketed argument of a grammar.
#[derive(Debug, Clone, Copy)]
pub enum Arg {
    /// Any non-empty text, commas included. Captured.
    Any,
    /// Non-empty text without commas. Captured.
    Field,
    /// Trailing optional argument without commas. Captured, may be absent.
    Optional,
    /// A fixed word. Not captured.
    Literal(&'static str),
    /// One of a fixed set of words. Captured.
    OneOf(&'static [&'static str]),
}

impl Arg {
    fn pattern(&self) -> String {
        match self {
            Arg::Any => "(.+)".to_string(),
            Arg::Field => "([^,]+)".to_string(),
            Arg::Optional => "(?:,([^,]*))?".to_string(),
            Arg::Literal(word) => regex::escape(word),
            Arg::OneOf(words) => {
                let alternatives: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
                format!("({})", alternatives.join("|"))
            }
        }
    }

    fn signature(&self) -> String {
        match self {
            Arg::Any | Arg::Field => "*".to_string(),
            Arg::Optional => "[*]".to_string(),
            Arg::Literal(word) => word.to_string(),
            Arg::OneOf(words) => words.join("|"),
        }
    }
}

/// A compiled command grammar.
#[derive(Debug, Clone)]
pub struct Grammar {
    signature: String,
    pattern: Regex,
}

impl Grammar {
    /// Compile `key[arg,arg,...]`. With no arguments, any bracketed suffix
    /// (`vm.discovery[*]`) is accepted and ignored.
    pub fn new(key: &str, args: &[Arg]) -> Result<Self> {
        let mut pattern = format!("{}{}", FRAMING_PREFIX, regex::escape(key));
        let mut signature = key.to_string();

        if args.is_empty() {
            pattern.push_str(r"(?:\[.*\])?");
        } else {
            pattern.push_str(r"\[");
            let mut shown = Vec::with_capacity(args.len());
            for (i, arg) in args.iter().enumerate() {
                if i > 0 && !matches!(arg, Arg::Optional) {
                    pattern.push(',');
                }
                pattern.push_str(&arg.pattern());
                shown.push(arg.signature());
            }
            pattern.push_str(r"\]");
            signature.push_str(&format!("[{}]", shown.join(",")));
        }
        pattern.push_str(r"\s*$");

        let pattern = Regex::new(&pattern).map_err(|e| VmbixError::Other(e.into()))?;
        Ok(Self { signature, pattern })
    }

    /// Human-readable form, e.g. `vm.memory[*,total]`.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Match a whole line, returning the captured arguments.
    pub fn captures(&self, line: &str) -> Option<Args> {
        let caps = self.pattern.captures(line)?;
        let values = caps.iter().skip(1).map(|m| m.map(|m| m.as_str().to_string())).collect();
        Some(Args(values))
    }
}

/// Captured arguments of a matched grammar, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args(Vec<Option<String>>);

impl Args {
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self(values)
    }

    /// Argument `index`, or `""` when absent.
    pub fn get(&self, index: usize) -> &str {
        self.optional(index).unwrap_or("")
    }

    /// Argument `index`, or `None` when absent or empty.
    pub fn optional(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|v| v.as_deref()).filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Produces the reply for a matched command.
///
/// Implementations report lookup failures as default replies and only
/// return `Err` for failures they cannot express as a reply.
#[async_trait]
pub trait Handler<C>: Send + Sync {
    async fn handle(&self, ctx: &C, args: &Args) -> Result<String>;
}

struct Route<C> {
    grammar: Grammar,
    handler: Box<dyn Handler<C>>,
}

/// Ordered grammar table.
pub struct Dispatcher<C> {
    routes: Vec<Route<C>>,
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<C: Send + Sync> Dispatcher<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a grammar. Later registrations have lower priority.
    pub fn add<H>(&mut self, key: &str, args: &[Arg], handler: H) -> Result<&mut Self>
    where
        H: Handler<C> + 'static,
    {
        let grammar = Grammar::new(key, args)?;
        self.routes.push(Route { grammar, handler: Box::new(handler) });
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First matching grammar for `line`, without running its handler.
    pub fn matching(&self, line: &str) -> Option<(&str, Args)> {
        self.routes
            .iter()
            .find_map(|route| route.grammar.captures(line).map(|args| (route.grammar.signature(), args)))
    }

    /// Dispatch one request line.
    ///
    /// Returns `None` when the handler failed without a reply; the caller
    /// then closes the connection without answering.
    pub async fn dispatch(&self, ctx: &C, line: &str) -> Option<String> {
        let started = Instant::now();

        for route in &self.routes {
            let Some(args) = route.grammar.captures(line) else {
                continue;
            };
            debug!(command = %line, grammar = %route.grammar.signature(), "Dispatching");

            return match route.handler.handle(ctx, &args).await {
                Ok(reply) => {
                    vmbix_metrics::record_dispatch("reply", started.elapsed().as_secs_f64());
                    Some(reply)
                }
                Err(e) => {
                    error!(command = %line, error = %e, "Handler failed");
                    vmbix_metrics::record_dispatch("failed", started.elapsed().as_secs_f64());
                    None
                }
            };
        }

        info!(command = %line, "Request not supported");
        vmbix_metrics::record_dispatch("unsupported", started.elapsed().as_secs_f64());
        Some(NOT_SUPPORTED.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replies with its label and the captured arguments.
    struct Echo(&'static str);

    #[async_trait]
    impl Handler<()> for Echo {
        async fn handle(&self, _ctx: &(), args: &Args) -> Result<String> {
            let shown: Vec<&str> = (0..args.len()).map(|i| args.get(i)).collect();
            Ok(format!("{}:{}", self.0, shown.join(",")))
        }
    }

    struct Broken;

    #[async_trait]
    impl Handler<()> for Broken {
        async fn handle(&self, _ctx: &(), _args: &Args) -> Result<String> {
            Err(VmbixError::remote("get_field", "connection reset"))
        }
    }

    fn table() -> Dispatcher<()> {
        let mut d = Dispatcher::new();
        d.add("vm.memory", &[Arg::Any, Arg::Literal("total")], Echo("size")).unwrap();
        d.add("vm.memory", &[Arg::Any, Arg::Field], Echo("stat")).unwrap();
        d.add("vm.discovery.full", &[], Echo("full")).unwrap();
        d.add("vm.discovery", &[], Echo("plain")).unwrap();
        d.add("vm.counter", &[Arg::Field, Arg::Field, Arg::Optional, Arg::Optional], Echo("counter"))
            .unwrap();
        d.add("vm.broken", &[Arg::Any], Broken).unwrap();
        d
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let d = table();
        assert_eq!(d.dispatch(&(), "vm.memory[myvm,total]").await.as_deref(), Some("size:myvm"));
        assert_eq!(d.dispatch(&(), "vm.memory[myvm,ballooned]").await.as_deref(), Some("stat:myvm,ballooned"));
        assert_eq!(d.matching("vm.memory[myvm,total]").map(|(s, _)| s), Some("vm.memory[*,total]"));
    }

    #[tokio::test]
    async fn test_declaration_order_not_specificity() {
        let mut d = Dispatcher::new();
        d.add("vm.memory", &[Arg::Any, Arg::Field], Echo("stat")).unwrap();
        d.add("vm.memory", &[Arg::Any, Arg::Literal("total")], Echo("size")).unwrap();
        assert_eq!(d.dispatch(&(), "vm.memory[myvm,total]").await.as_deref(), Some("stat:myvm,total"));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let d = table();
        assert_eq!(d.dispatch(&(), "zzz.unknown[1]").await.as_deref(), Some(NOT_SUPPORTED));
        assert_eq!(d.dispatch(&(), "").await.as_deref(), Some(NOT_SUPPORTED));
    }

    #[tokio::test]
    async fn test_bare_keys_accept_bracket_suffix() {
        let d = table();
        assert_eq!(d.dispatch(&(), "vm.discovery[*]").await.as_deref(), Some("plain:"));
        assert_eq!(d.dispatch(&(), "vm.discovery.full").await.as_deref(), Some("full:"));
    }

    #[tokio::test]
    async fn test_framing_prefix_ignored() {
        let d = table();
        assert_eq!(d.dispatch(&(), "ZBXD\u{1}vm.memory[web01,total]").await.as_deref(), Some("size:web01"));
    }

    #[tokio::test]
    async fn test_optional_arguments() {
        let d = table();
        let (_, args) = d.matching("vm.counter[web01,cpu.usage.average]").unwrap();
        assert_eq!(args.optional(2), None);
        assert_eq!(args.optional(3), None);

        let (_, args) = d.matching("vm.counter[web01,net.usage.average,vmnic0,60]").unwrap();
        assert_eq!(args.get(2), "vmnic0");
        assert_eq!(args.get(3), "60");

        let (_, args) = d.matching("vm.counter[web01,net.usage.average,,60]").unwrap();
        assert_eq!(args.optional(2), None);
        assert_eq!(args.optional(3), Some("60"));
    }

    #[tokio::test]
    async fn test_handler_error_yields_no_reply() {
        let d = table();
        assert_eq!(d.dispatch(&(), "vm.broken[web01]").await, None);
    }

    #[test]
    fn test_key_must_be_anchored() {
        let grammar = Grammar::new("vm.name", &[Arg::Any]).unwrap();
        assert!(grammar.captures("vm.name[web01]").is_some());
        assert!(grammar.captures("xvm.name[web01]").is_none());
        assert!(grammar.captures("vm.name[web01]trailing").is_none());
        assert!(grammar.captures("vmXname[web01]").is_none());
    }
}
