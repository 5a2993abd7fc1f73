//! Prompt 模板
//!
//! 系统级指令定义 AI 的总体行为；特定任务指令按题型拼装。
//! 所有 Prompt 都要求严格的 JSON 输出，解析逻辑见 strategy::support。

/// 系统级指令
pub const SYSTEM_PROMPT: &str = r#"
你是一个用于解答U校园英语题的AI助手。你的任务是仔细阅读所提供的对话或文章，并根据问题选择最合适的答案。请遵循以下高级指导原则：

1.  **你必须总是使用英语来回答所有问题。**
2.  **精确归因**：当问题问及某人的观点或建议时（例如，"What does the woman suggest?"），请确保答案来自于该说话人的直接陈述或明确同意。
3.  **处理模糊同意**：如果一个说话人对另一个说话人提出的多个建议只用了一句笼统的话来同意（如"That's a good idea"），这通常意味着同意核心观点或首要建议。在选择答案时，请仔细分辨哪个是更核心或首要的建议。
4.  **严格按JSON格式输出**：你需要严格根据用户的指示，分析问题并以JSON格式返回答案。
"#;

const SINGLE_CHOICE_HEADER: &str = r#"请帮我解答以下英语单选题, 并将答案以JSON格式输出。每个题目的答案应包含正确答案。JSON格式如下:
{
  "questions": [
    {
      "answer": "正确答案(只需要给出ABCD)"
    }
  ]
}
"#;

const MULTIPLE_CHOICE_HEADER: &str = r#"请帮我解答以下英语多选题, 并将答案以JSON格式输出。答案为列表形式，包含所有正确选项。JSON格式如下:
{
  "questions": [
    {
      "answer": ["A", "C"]
    }
  ]
}
"#;

/// 单选题 Prompt
pub fn single_choice(direction: &str, article: &str, questions: &str) -> String {
    let article_section = if article.is_empty() {
        String::new()
    } else {
        format!("以下是文章内容:\n{}\n\n", article)
    };
    format!(
        "{}\n以下是题目的说明:\n{}\n\n{}以下是题目和选项:\n{}",
        SINGLE_CHOICE_HEADER, direction, article_section, questions
    )
}

/// 多选题 Prompt
pub fn multiple_choice(direction: &str, article: &str, question: &str) -> String {
    let article_section = if article.is_empty() {
        String::new()
    } else {
        format!("以下是文章内容:\n{}\n\n", article)
    };
    format!(
        "{}\n以下是题目的说明:\n{}\n\n{}以下是题目和选项:\n{}",
        MULTIPLE_CHOICE_HEADER, direction, article_section, question
    )
}

/// 填空题 Prompt
pub fn fill_in_the_blank(direction: &str, article: &str, question_text: &str) -> String {
    format!(
        r#"请帮我解答以下英语填空题。根据提供的上下文（文章或听力原文）以及题目文本，为每一个空白（由三个下划线 "___" 标识）提供最合适的单词或短语。

你需要将所有答案以JSON格式输出。JSON对象应包含一个名为 "questions" 的数组，该数组只包含一个对象，其 "answer" 字段是一个包含所有应填入内容的字符串列表。

例如，如果题目是 "The cat sat ___ the mat. The dog sat ___ the chair."，你应该返回：
{{
  "questions": [
    {{
      "answer": ["on", "beside"]
    }}
  ]
}}

---
以下是题目的说明:
{direction}

以下是文章或听力原文内容:
{article}

以下是带有空白的题目文本:
{question_text}"#
    )
}

/// 拖拽排序题 Prompt
pub fn drag_order(media_transcript: &str, options_list: &str) -> String {
    format!(
        r#"你是一个用于解答U校园英语题的AI助手。你的任务是根据提供的【媒体内容】（如果有）和【待排序选项列表】，将选项进行正确排序。

你需要返回一个JSON对象，其中包含一个名为 `ordered_options` 的数组。该数组应只包含【待排序选项列表】中每个选项开头的字母，并按照你认为正确的顺序排列。

例如，如果你认为正确的顺序是 B, A, C，那么你应该返回：
{{
  "ordered_options": ["B", "A", "C"]
}}

---
【媒体内容】:
{media_transcript}

【待排序选项列表】:
{options_list}"#
    )
}

/// 讨论题 Prompt
pub fn discussion(main_title: &str, sub_questions: &str) -> String {
    format!(
        r#"你是一名正在参与线上课程的大学生，需要对一系列问题发表评论。
请根据以下【主讨论标题】和【子问题列表】，**分别回答**每一个子问题。

请将你的所有回答以一个JSON数组的形式返回。数组中的每个字符串都应对应一个子问题的答案。
JSON格式如下:
{{
  "answers": [
    "Your answer to the first sub-question.",
    "Your answer to the second sub-question."
  ]
}}

---
【主讨论标题】:
{main_title}

【子问题列表】:
{sub_questions}"#
    )
}

/// 简答题 Prompt
pub fn short_answer(direction: &str, article_section: &str, sub_questions: &str) -> String {
    format!(
        r#"你是一个用于解答U校园英语题的AI助手。请根据以下提供的上下文信息（包括题目说明、文章或听力原文）和一系列子问题，为每一个子问题生成一个简洁明了的英文回答。

**重要规则：** 如果提供的上下文信息（文章、听力原文等）不足以回答问题，或者上下文为空，请不要直接说明信息不足。相反，你应该利用你的通用知识，围绕"学习"、"个人成长"、"沟通技巧"或"社会观察"等常见教育主题，为问题生成一个听起来合理、具有普遍性的英文回答。

请将你的所有回答以一个JSON对象的形式返回，该对象包含一个名为 "answers" 的数组，数组中的每个字符串都应对应一个子问题的答案。

JSON格式如下:
{{
  "answers": [
    "Your concise answer to the first sub-question.",
    "Your concise answer to the second sub-question."
  ]
}}

---
【题目说明】:
{direction}

{article_section}【子问题列表】:
{sub_questions}"#
    )
}

/// 表格型简答题 Prompt
pub fn table_short_answer(direction: &str, article: &str) -> String {
    format!(
        r#"你是一个用于解答U校园英语题的AI助手。请根据以下提供的上下文信息（其中可能包含HTML格式的表格），特别是表格内容，为每一个[Blank X]生成一个简洁明了的英文回答。
你需要理解表格的结构，通常每一行是一个问题，每一列是一个对象（如Student 1, Student 2），[Blank X]是它们的交叉点。你的回答需要符合对应的问题和对象。

请将你的所有回答以一个JSON对象的形式返回，该对象包含一个名为 "answers" 的数组，数组中的每个字符串都应对应一个[Blank X]的答案，并严格按照[Blank 1], [Blank 2], ... 的顺序排列。

JSON格式如下:
{{
  "answers": [
    "Answer for [Blank 1]",
    "Answer for [Blank 2]"
  ]
}}

---
【题目说明】:
{direction}

{article}"#
    )
}

/// 语音简答题 Prompt
pub fn qa_voice(
    direction: &str,
    article: &str,
    additional_material: &str,
    question: &str,
) -> String {
    format!(
        r#"你是一个用于解答U校园语音简答题的AI助手。你的任务是根据所有提供的上下文信息（包括题目说明、文章或听力原文、额外材料等），为以下问题提供一个简洁、直接的英文口语化回答。
你的回答必须严格遵循以下JSON格式，只包含一个 "answer" 字段：
{{
  "answer": "Your concise, spoken English answer here."
}}

---
【题目说明】:
{direction}

【文章或听力原文内容】:
{article}

【额外材料】:
{additional_material}

---
问题: {question}"#
    )
}

/// 口语陈述题 Prompt
pub fn oral_recitation(main_question: &str, keywords: &str) -> String {
    format!(
        r#"你是一个用于辅助完成U校园"口语陈述题"的AI助手。你的任务是根据一个【主问题】的要求，并参考提供的一系列【关键词或笔记】，将这些笔记扩展成一个或多个语法正确、表达流畅、逻辑连贯的英文句子以回答主问题。
你的回答必须严格遵循以下JSON格式，只包含一个 "answer" 字段：
{{
  "answer": "Your expanded, fluent English sentence(s) answering the main question based on the keywords."
}}

---
【主问题】:
{main_question}

---
【关键词或笔记】:
{keywords}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_choice_omits_empty_article() {
        let p = single_choice("说明", "", "1. A or B?");
        assert!(!p.contains("以下是文章内容"));
        assert!(p.contains("1. A or B?"));
    }

    #[test]
    fn test_single_choice_includes_article() {
        let p = single_choice("说明", "some article", "Q");
        assert!(p.contains("以下是文章内容:\nsome article"));
    }

    #[test]
    fn test_qa_voice_contains_all_sections() {
        let p = qa_voice("dir", "art", "extra", "What?");
        assert!(p.contains("dir"));
        assert!(p.contains("art"));
        assert!(p.contains("extra"));
        assert!(p.contains("问题: What?"));
    }
}
