use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Illustration {
    pub title: &'static str,
    /// Name of the renderable component the front end mounts.
    pub component: &'static str,
}

const fn ill(title: &'static str, component: &'static str) -> Illustration {
    Illustration { title, component }
}

/// Visual aids for one article: `main` sits beside the lead section, `inline`
/// rotates through the sections after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IllustrationBundle {
    pub main: Option<Illustration>,
    pub inline: Vec<Illustration>,
}

impl IllustrationBundle {
    /// Illustration paired with the section at `index` in render order.
    /// Index 0 gets `main`; later sections cycle through `inline[index % len]`.
    pub fn for_section(&self, index: usize) -> Option<&Illustration> {
        if index == 0 {
            return self.main.as_ref();
        }
        if self.inline.is_empty() {
            return None;
        }
        self.inline.get(index % self.inline.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IllustrationKey {
    Transistors,
    LogicGates,
    CpuPipeline,
    MemoryHierarchy,
    Scheduling,
    Networking,
    Compilers,
    Databases,
}

impl IllustrationKey {
    pub const ALL: &'static [IllustrationKey] = &[
        IllustrationKey::Transistors,
        IllustrationKey::LogicGates,
        IllustrationKey::CpuPipeline,
        IllustrationKey::MemoryHierarchy,
        IllustrationKey::Scheduling,
        IllustrationKey::Networking,
        IllustrationKey::Compilers,
        IllustrationKey::Databases,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IllustrationKey::Transistors => "transistors",
            IllustrationKey::LogicGates => "logic-gates",
            IllustrationKey::CpuPipeline => "cpu-pipeline",
            IllustrationKey::MemoryHierarchy => "memory-hierarchy",
            IllustrationKey::Scheduling => "scheduling",
            IllustrationKey::Networking => "networking",
            IllustrationKey::Compilers => "compilers",
            IllustrationKey::Databases => "databases",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == key)
    }

    pub fn bundle(self) -> IllustrationBundle {
        let (main, inline) = match self {
            IllustrationKey::Transistors => (
                ill("A transistor as a switch", "TransistorSwitch"),
                vec![
                    ill("Doping and the junction", "PnJunction"),
                    ill("From switch to inverter", "CmosInverter"),
                ],
            ),
            IllustrationKey::LogicGates => (
                ill("The basic gates", "GateGallery"),
                vec![
                    ill("Truth tables", "TruthTable"),
                    ill("Building a half adder", "HalfAdder"),
                    ill("NAND is universal", "NandUniversal"),
                ],
            ),
            IllustrationKey::CpuPipeline => (
                ill("Five-stage pipeline", "PipelineStages"),
                vec![
                    ill("A data hazard", "DataHazard"),
                    ill("Forwarding paths", "ForwardingPaths"),
                    ill("Branch prediction", "BranchPredictor"),
                ],
            ),
            IllustrationKey::MemoryHierarchy => (
                ill("Registers to disk", "MemoryPyramid"),
                vec![
                    ill("Cache lines", "CacheLines"),
                    ill("Latency ladder", "LatencyLadder"),
                ],
            ),
            IllustrationKey::Scheduling => (
                ill("Processes on a timeline", "ScheduleTimeline"),
                vec![
                    ill("Round robin", "RoundRobin"),
                    ill("Priority queues", "PriorityQueues"),
                ],
            ),
            IllustrationKey::Networking => (
                ill("The protocol stack", "ProtocolStack"),
                vec![
                    ill("TCP handshake", "TcpHandshake"),
                    ill("Packets in flight", "PacketFlow"),
                    ill("Congestion window", "CongestionWindow"),
                ],
            ),
            IllustrationKey::Compilers => (
                ill("Source to machine code", "CompilerPipeline"),
                vec![
                    ill("A syntax tree", "SyntaxTree"),
                    ill("Register allocation", "RegisterAllocation"),
                ],
            ),
            IllustrationKey::Databases => (
                ill("Anatomy of a query", "QueryAnatomy"),
                vec![
                    ill("B-tree lookup", "BTreeLookup"),
                    ill("Write-ahead log", "WriteAheadLog"),
                ],
            ),
        };
        IllustrationBundle {
            main: Some(main),
            inline,
        }
    }
}

/// Bundle used for articles without a key, or with a key the registry
/// doesn't know.
pub fn default_bundle() -> IllustrationBundle {
    IllustrationBundle {
        main: Some(ill("Concept map", "ConceptMap")),
        inline: vec![ill("Key idea", "KeyIdea"), ill("In practice", "InPractice")],
    }
}

/// Look up the bundle for `key`. Never fails: unknown or missing keys get
/// [`default_bundle`].
pub fn resolve(key: Option<&str>) -> IllustrationBundle {
    key.and_then(IllustrationKey::from_key)
        .map(IllustrationKey::bundle)
        .unwrap_or_else(default_bundle)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_key() {
        let bundle = resolve(Some("memory-hierarchy"));
        assert_eq!(bundle.main.map(|m| m.component), Some("MemoryPyramid"));
        assert_eq!(bundle.inline.len(), 2);
    }

    #[test]
    fn unknown_key_falls_back() {
        assert_eq!(resolve(Some("nonexistent-key-xyz")), default_bundle());
    }

    #[test]
    fn missing_key_falls_back() {
        assert_eq!(resolve(None), default_bundle());
        assert_eq!(resolve(Some("")), default_bundle());
    }

    #[test]
    fn keys_are_case_sensitive() {
        assert_eq!(resolve(Some("Networking")), default_bundle());
    }

    #[test]
    fn every_key_round_trips() {
        for key in IllustrationKey::ALL {
            assert_eq!(IllustrationKey::from_key(key.as_str()), Some(*key));
            let bundle = key.bundle();
            assert!(bundle.main.is_some());
            assert!(!bundle.inline.is_empty());
        }
    }

    #[test]
    fn sections_rotate_through_inline() {
        let bundle = resolve(Some("logic-gates"));
        let picks: Vec<_> = (0..6)
            .map(|i| bundle.for_section(i).map(|ill| ill.component))
            .collect();
        assert_eq!(
            picks,
            vec![
                Some("GateGallery"),
                Some("HalfAdder"),
                Some("NandUniversal"),
                Some("TruthTable"),
                Some("HalfAdder"),
                Some("NandUniversal"),
            ]
        );
    }

    #[test]
    fn empty_inline_yields_nothing_after_lead() {
        let bundle = IllustrationBundle {
            main: None,
            inline: Vec::new(),
        };
        assert!(bundle.for_section(0).is_none());
        assert!(bundle.for_section(3).is_none());
    }
}
