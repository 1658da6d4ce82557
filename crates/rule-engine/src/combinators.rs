//! 规则组合
//!
//! 将独立解析或存储的规则组合为一个可评估单元，输入节点不会被修改。

use crate::models::RuleNode;
use crate::operators::LogicalOperator;

/// 以 AND 组合两条规则
pub fn combine(left: RuleNode, right: RuleNode) -> RuleNode {
    RuleNode::and(left, right)
}

/// 以 OR 组合两条规则
pub fn combine_or(left: RuleNode, right: RuleNode) -> RuleNode {
    RuleNode::or(left, right)
}

/// 按给定逻辑操作符从左到右折叠多条规则，空输入返回 None
pub fn combine_all<I>(rules: I, operator: LogicalOperator) -> Option<RuleNode>
where
    I: IntoIterator<Item = RuleNode>,
{
    rules
        .into_iter()
        .reduce(|acc, next| RuleNode::group(operator, acc, next))
}
