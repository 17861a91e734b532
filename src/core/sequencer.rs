use std::collections::HashMap;

/// Logical read operations whose responses can race each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    AvailableStacks,
    RunningStacks,
    StackYaml,
    Sonar,
    Trivy,
    ScanImage,
    History,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token(u64);

/// Hands out increasing tokens per operation. A response is applied only if
/// its token is still the latest one issued for that operation.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: HashMap<Operation, u64>,
}

impl RequestSequencer {
    pub fn issue(&mut self, op: Operation) -> Token {
        let n = self.latest.entry(op).or_insert(0);
        *n += 1;
        Token(*n)
    }

    pub fn is_latest(&self, op: Operation, token: Token) -> bool {
        self.latest.get(&op).copied() == Some(token.0)
    }
}
