//! Static domain taxonomy and the colors used to render it

use ratatui::style::Color;
use triage_dashboard_sdk::Priority;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainInfo {
    pub key: &'static str,
    pub full_name: &'static str,
    pub description: &'static str,
    pub color: Color,
}

pub const UNKNOWN: DomainInfo = DomainInfo {
    key: "Unknown",
    full_name: "Unknown Domain",
    description: "Domain could not be determined",
    color: Color::Gray,
};

pub const DOMAINS: &[DomainInfo] = &[
    DomainInfo {
        key: "Billing",
        full_name: "Core Billing Services",
        description: "Billing operations, invoicing, payment processing, AWD setup",
        color: Color::Blue,
    },
    DomainInfo {
        key: "Enrollment",
        full_name: "Member Enrollment Services",
        description: "Member enrollment, family plans, COBRA, SEP, dependent management",
        color: Color::Green,
    },
    DomainInfo {
        key: "Claims",
        full_name: "Claims Processing",
        description: "Claims submission, adjudication, COB, denials, EOB generation",
        color: Color::Magenta,
    },
    DomainInfo {
        key: "Premium",
        full_name: "Premium Calculation",
        description: "Premium rates, subsidies, rate changes, APTC calculations",
        color: Color::Yellow,
    },
    DomainInfo {
        key: "Renewal",
        full_name: "Renewal Processing",
        description: "Annual renewals, plan migrations, AWD continuation",
        color: Color::LightRed,
    },
    DomainInfo {
        key: "Integration",
        full_name: "System Integration",
        description: "EDI transactions, payment gateway, external system interfaces",
        color: Color::Cyan,
    },
    DomainInfo {
        key: "Reporting",
        full_name: "Analytics & Reporting",
        description: "Dashboards, reconciliation reports, data analytics",
        color: Color::LightBlue,
    },
    DomainInfo {
        key: "CustomerService",
        full_name: "Customer Service",
        description: "CSR portal, member support, account updates",
        color: Color::LightMagenta,
    },
    DomainInfo {
        key: "Security",
        full_name: "Security & Compliance",
        description: "Data encryption, RBAC, PCI-DSS compliance, audit trails",
        color: Color::Red,
    },
    DomainInfo {
        key: "Performance",
        full_name: "Performance Testing",
        description: "Load testing, batch processing SLAs, throughput benchmarks",
        color: Color::Gray,
    },
    // Legacy domains still returned by older backends
    DomainInfo {
        key: "MM",
        full_name: "Member Management",
        description: "Member management and core operations",
        color: Color::Blue,
    },
    DomainInfo {
        key: "CIW",
        full_name: "Claims & Integration",
        description: "Claims processing and system integration",
        color: Color::Magenta,
    },
    DomainInfo {
        key: "Specialty",
        full_name: "Specialty Services",
        description: "Specialized healthcare services",
        color: Color::LightMagenta,
    },
];

/// Look up a domain, falling back to [`UNKNOWN`]
pub fn domain(key: &str) -> &'static DomainInfo {
    DOMAINS.iter().find(|d| d.key == key).unwrap_or(&UNKNOWN)
}

pub fn priority_from_str(value: &str) -> Option<Priority> {
    match value {
        "Low" => Some(Priority::Low),
        "Medium" => Some(Priority::Medium),
        "High" => Some(Priority::High),
        "Critical" => Some(Priority::Critical),
        _ => None,
    }
}

pub fn priority_color(value: &str) -> Color {
    match priority_from_str(value) {
        Some(Priority::Critical) => Color::Red,
        Some(Priority::High) => Color::LightRed,
        Some(Priority::Medium) => Color::Yellow,
        Some(Priority::Low) => Color::Green,
        None => Color::Gray,
    }
}
