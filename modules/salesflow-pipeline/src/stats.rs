/// Counters from one pipeline invocation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub pages_visited: u32,
    pub profiles_visited: u32,
    pub profiles_rejected: u32,
    pub leads_discovered: u32,
    pub leads_merged: u32,
    pub emails_found: u32,
    pub drafts_written: u32,
    pub emails_sent: u32,
    pub send_failures: u32,
    pub replies_found: u32,
    pub acknowledgments_sent: u32,
    pub nudges_sent: u32,
    pub meetings_scheduled: u32,
    pub meeting_overlaps: u32,
    pub proposals_generated: u32,
    pub reports_sent: u32,
    pub stage_failures: u32,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Salesflow Run Complete ===")?;
        writeln!(f, "Search pages:       {}", self.pages_visited)?;
        writeln!(f, "Profiles visited:   {}", self.profiles_visited)?;
        writeln!(f, "Profiles rejected:  {}", self.profiles_rejected)?;
        writeln!(f, "Leads discovered:   {}", self.leads_discovered)?;
        writeln!(f, "Leads merged:       {}", self.leads_merged)?;
        writeln!(f, "Emails found:       {}", self.emails_found)?;
        writeln!(f, "Drafts written:     {}", self.drafts_written)?;
        writeln!(f, "Emails sent:        {}", self.emails_sent)?;
        if self.send_failures > 0 {
            writeln!(f, "Send failures:      {}", self.send_failures)?;
        }
        writeln!(f, "Replies found:      {}", self.replies_found)?;
        writeln!(f, "Acks sent:          {}", self.acknowledgments_sent)?;
        writeln!(f, "Nudges sent:        {}", self.nudges_sent)?;
        writeln!(f, "Meetings scheduled: {}", self.meetings_scheduled)?;
        writeln!(f, "Meeting overlaps:   {}", self.meeting_overlaps)?;
        writeln!(f, "Proposals:          {}", self.proposals_generated)?;
        writeln!(f, "Reports sent:       {}", self.reports_sent)?;
        if self.stage_failures > 0 {
            writeln!(f, "Stage failures:     {}", self.stage_failures)?;
        }
        Ok(())
    }
}
