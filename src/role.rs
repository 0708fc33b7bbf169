//! Role definitions — the content each agent sends to the generation service
//!
//! A role is plain data: a name, a section key, and two pure functions that
//! derive the system instructions and the user content from the request
//! context. All five built-in roles share the same execution machinery in
//! [`crate::agent::Agent`]; callers can substitute their own roles for
//! custom pipelines.

use crate::types::{RequestContext, SectionKey};

/// One generation role: name, output section, and prompt builders.
#[derive(Clone, Copy)]
pub struct Role {
    /// Stable display name (e.g., "MarketResearcher"), reported through
    /// progress callbacks and logs
    pub name: &'static str,
    /// Section the role's output belongs to
    pub key: SectionKey,
    /// Builds the system instructions for one run
    pub instructions: fn(&RequestContext) -> String,
    /// Builds the user content for one run
    pub content: fn(&RequestContext) -> String,
}

impl std::fmt::Debug for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Role")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish()
    }
}

/// The market research role (Phase 1).
pub fn market_researcher() -> Role {
    Role {
        name: "MarketResearcher",
        key: SectionKey::Market,
        instructions: |_ctx| {
            "You are a market analysis expert. Provide a structured market analysis \
             with the following sections:\n\n\
             ## TAM / SAM / SOM\n\
             Estimates with reasoning and calculation method for each.\n\n\
             ## Market Growth\n\
             CAGR estimates (past 3 years, next 3-5 years) and growth drivers.\n\n\
             ## Competitive Landscape\n\
             Analysis of 3-5 key competitors (strengths, weaknesses, market share), \
             their differentiation, and our entry opportunity.\n\n\
             ## Regulatory Environment\n\
             Industry-specific regulation and compliance requirements.\n\n\
             ## Market Trends\n\
             3-5 current trends and shifts in customer needs.\n\n\
             Use Markdown with headings, tables, and bullet lists."
                .to_string()
        },
        content: |ctx| {
            let mut prompt = subject_header(ctx);
            prompt.push_str(
                "\nProvide a detailed market analysis for this company covering \
                 TAM/SAM/SOM, market growth, competition, regulation, and trends.",
            );
            prompt
        },
    }
}

/// The product strategy role (Phase 1).
pub fn product_strategist() -> Role {
    Role {
        name: "ProductStrategist",
        key: SectionKey::Product,
        instructions: |_ctx| {
            "You are a product strategy expert. Produce a product strategy with:\n\n\
             ## Value Proposition\n\
             The problem solved, for whom, and why now.\n\n\
             ## Product Overview\n\
             Core capabilities, differentiation, and defensibility.\n\n\
             ## Roadmap\n\
             Phased feature roadmap aligned with market maturity.\n\n\
             ## Pricing and Packaging\n\
             Tiers, pricing logic, and expansion paths.\n\n\
             Use Markdown with headings, tables, and bullet lists."
                .to_string()
        },
        content: |ctx| {
            let mut prompt = subject_header(ctx);
            prompt.push_str(
                "\nDefine the product strategy for this company, making the \
                 differentiation and defensibility explicit.",
            );
            prompt
        },
    }
}

/// The financial modeling role (Phase 1).
pub fn financial_modeler() -> Role {
    Role {
        name: "FinancialModeler",
        key: SectionKey::Finance,
        instructions: |ctx| {
            format!(
                "You are a financial planning expert. Build a {}-year financial plan with:\n\n\
                 ## Revenue Model\n\
                 Revenue streams, unit economics, and key assumptions.\n\n\
                 ## Projections\n\
                 Year-by-year revenue, cost, and profit projections in a Markdown table.\n\n\
                 ## Funding Plan\n\
                 Capital requirements, runway, and funding milestones.\n\n\
                 ## Key Metrics\n\
                 CAC, LTV, gross margin, and break-even timing.\n\n\
                 State every assumption explicitly and keep all figures internally consistent.",
                ctx.plan_years
            )
        },
        content: |ctx| {
            let mut prompt = subject_header(ctx);
            prompt.push_str(&format!(
                "\nBuild the {}-year financial plan for this company, including \
                 projections, funding needs, and key metrics.",
                ctx.plan_years
            ));
            prompt
        },
    }
}

/// The go-to-market strategy role (Phase 1).
pub fn gtm_strategist() -> Role {
    Role {
        name: "GTMStrategist",
        key: SectionKey::Gtm,
        instructions: |_ctx| {
            "You are a go-to-market strategy expert. Produce a GTM strategy with:\n\n\
             ## Target Segments\n\
             Ideal customer profile and segment prioritization.\n\n\
             ## Acquisition Channels\n\
             Channel mix with expected CAC per channel.\n\n\
             ## Sales Motion\n\
             Sales model (self-serve, inside sales, field), team plan, and quota math.\n\n\
             ## Launch Plan\n\
             Sequenced launch milestones for the first 12 months.\n\n\
             Keep CAC and LTV figures consistent across sections. Use Markdown."
                .to_string()
        },
        content: |ctx| {
            let mut prompt = subject_header(ctx);
            prompt.push_str(
                "\nDefine the go-to-market strategy for this company, covering \
                 segments, channels, sales motion, and launch plan.",
            );
            prompt
        },
    }
}

/// The integration editor role (Phase 2).
///
/// Consumes the Phase 1 section outputs from [`RequestContext::sections`] and
/// synthesizes the final plan document. Sections are aggregated as given;
/// degraded fallback text is not distinguished from real content at this
/// layer (the report's `degraded` list is the caller's channel for that).
pub fn integration_editor() -> Role {
    Role {
        name: "IntegrationEditor",
        key: SectionKey::Integration,
        instructions: |_ctx| {
            "You are an expert editor of business plan documents. Integrate the \
             outputs of four specialist agents into one complete business plan with \
             this structure:\n\n\
             ## Table of Contents\n\
             ## 1. Executive Summary (written fresh: overview, problem and value \
             proposition, market opportunity, product, revenue targets, funding plan, \
             risks and key success factors)\n\
             ## 2. Market Analysis (edited from the market researcher output)\n\
             ## 3. Product Strategy (edited from the product strategist output)\n\
             ## 4. Financial Plan (edited from the financial modeler output)\n\
             ## 5. GTM & Sales Strategy (edited from the GTM strategist output)\n\
             ## 6. Risks and Mitigations (extracted and prioritized across sections)\n\
             ## 7. Execution Roadmap (quarterly milestones)\n\
             ## 8. Appendix (assumptions, glossary, references)\n\n\
             Remove duplication, unify terminology, keep every figure consistent \
             across sections, and preserve Markdown table formatting."
                .to_string()
        },
        content: |ctx| {
            let mut prompt = subject_header(ctx);
            prompt.push_str(&format!("Plan horizon: {} years\n\n", ctx.plan_years));
            prompt.push_str(
                "Integrate the following four agent outputs into one complete \
                 business plan.\n",
            );
            for key in SectionKey::PHASE1 {
                let section = ctx.sections.get(&key).map(String::as_str).unwrap_or("");
                prompt.push_str(&format!(
                    "\n---\n\n## {} agent output\n{}\n",
                    key.as_str(),
                    section
                ));
            }
            prompt.push_str(
                "\n---\n\nWrite the executive summary fresh and verify consistency \
                 across all sections.",
            );
            prompt
        },
    }
}

/// The four built-in Phase 1 roles, in presentation order.
pub fn phase1_roles() -> [Role; 4] {
    [
        market_researcher(),
        product_strategist(),
        financial_modeler(),
        gtm_strategist(),
    ]
}

/// Fallback section text substituted when a Phase 1 role fails all retries.
///
/// The orchestrator appends the captured error detail to this text, so a
/// degraded plan still carries every section plus a diagnostic.
pub fn fallback_section(key: SectionKey) -> &'static str {
    match key {
        SectionKey::Market => {
            "# Market Analysis\n\n\
             Market analysis generation failed. Outline the market size \
             (TAM/SAM/SOM), growth, competition, and trends manually."
        }
        SectionKey::Product => {
            "# Product Strategy\n\n\
             Product strategy generation failed. Clarify your product's \
             uniqueness and differentiation manually."
        }
        SectionKey::Finance => {
            "# Financial Plan\n\n\
             Financial plan generation failed. Build 3-5 year revenue, cost, \
             and profit projections manually."
        }
        SectionKey::Gtm => {
            "# Go-To-Market Strategy\n\n\
             GTM strategy generation failed. Define acquisition channels and \
             the sales organization manually."
        }
        SectionKey::Integration => {
            "# Business Plan\n\n\
             Plan integration failed."
        }
    }
}

fn subject_header(ctx: &RequestContext) -> String {
    let mut header = format!(
        "Company: {}\nBusiness: {}\n",
        ctx.company_name, ctx.business_description
    );
    if let Some(additional) = &ctx.additional_context {
        header.push_str(&format!("Additional context: {}\n", additional));
    }
    header
}
