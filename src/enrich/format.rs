// src/enrich/format.rs
// Renders a structured analysis into the calendar-event description. Pure and
// total: every schema shape renders, including empty lists.

use crate::enrich::analysis::AnalysisResult;

const DISCLAIMER: &str =
    "⚠️ 免责声明: 本分析由AI生成，仅供参考，不构成投资建议。投资有风险，入市需谨慎。";

pub fn format_analysis(analysis: &AnalysisResult) -> String {
    let mut out = String::new();

    if !analysis.related_sectors.companies.is_empty() {
        out.push_str("🏢 相关标的\n");
        for company in &analysis.related_sectors.companies {
            out.push_str(&format!("└ {company}\n"));
        }
        out.push('\n');
    }

    out.push_str("🔍 投资分析\n");

    if !analysis.opportunities.is_empty() {
        out.push_str("\n📈 投资机会\n");
        for opp in &analysis.opportunities {
            out.push_str(&format!(
                "【{}】{}\n",
                or_default(&opp.kind, "未分类"),
                or_default(&opp.target, "未指定")
            ));
            out.push_str(&format!("└ 投资逻辑: {}\n", or_default(&opp.rationale, "无")));
            if !analysis.returns.catalysts.is_empty() {
                out.push_str("└ 关键催化剂:\n");
                for catalyst in &analysis.returns.catalysts {
                    out.push_str(&format!("   • {catalyst}\n"));
                }
            }
        }
    }

    if !analysis.risks.is_empty() {
        out.push_str("\n⚠️ 风险提示\n");
        for risk in &analysis.risks {
            out.push_str(&format!(
                "【{}】{}\n",
                or_default(&risk.kind, "未分类"),
                or_default(&risk.description, "无描述")
            ));
            out.push_str(&format!("└ 应对策略: {}\n", or_default(&risk.mitigation, "无建议")));
        }
    }

    out.push('\n');
    out.push_str(DISCLAIMER);
    out
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}
