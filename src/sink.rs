use crate::finding::Finding;

/// Consumer boundary for findings that survive the pipeline.
pub trait FindingSink {
    fn deliver(&mut self, finding: Finding);
}

impl FindingSink for Vec<Finding> {
    fn deliver(&mut self, finding: Finding) {
        self.push(finding);
    }
}

/// Sink that collects delivered findings for later inspection.
#[derive(Default)]
pub struct CollectingSink {
    findings: Vec<Finding>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}

impl FindingSink for CollectingSink {
    fn deliver(&mut self, finding: Finding) {
        self.findings.push(finding);
    }
}
