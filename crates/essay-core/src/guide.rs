//! Essay-writing guide shared by the system prompts and the form-mode panel.

/// Embedded verbatim in both system prompts.
pub const ESSAY_GUIDE: &str = "
1. Understand the basic structure
- Introduction
  Thesis statement: the central idea or claim of the whole essay, usually placed at the end of the introduction.
  It must not be long or vague; it sets the direction for the entire essay.

- Body
  Topic sentence: states the key idea of each paragraph and comes first in the paragraph.
  Supporting sentences: back the topic sentence with concrete explanation, examples, facts and evidence.
  Remove unnecessary or unrelated sentences so the paragraph keeps its focus.

- Conclusion
  Summarize the whole essay and briefly restate your own opinion.
  Do not introduce a new topic; pull together what has already been discussed.

2. Features of a balanced opinion essay
- Treat both sides evenly (for and against, advantages and disadvantages).
- Give objective support: examples, cases and explanations for each position make it persuasive.
- Do not just list claims; include sentences that back them with data.

3. Cautions while writing
- Always settle the central claim (thesis) first, then build the remaining paragraphs around it.
- Keep exactly one key idea per paragraph.
- Coherence: thesis, topic sentences and supporting sentences must connect naturally.
- Delete unrelated sentences (for example, a line about drinking soda every day that breaks the flow).
- In the conclusion show a balanced view, but state your own final opinion clearly.
";

pub struct Checklist {
    pub title: &'static str,
    pub items: &'static [&'static str],
}

/// Self-review lists shown beside the form-mode editor.
pub const CHECKLISTS: &[Checklist] = &[
    Checklist {
        title: "Structure checklist",
        items: &[
            "Is there a clear thesis at the end of the introduction?",
            "Does each paragraph open with a topic sentence?",
            "Is each topic backed by concrete **evidence, examples or data**?",
            "Did you **delete** unrelated sentences (small talk, off-topic lines)?",
            "Does the conclusion close with a **summary and your final opinion** instead of a new topic?",
        ],
    },
    Checklist {
        title: "Balanced opinion essay",
        items: &[
            "Did you present **both positions** (for/against or pros/cons) evenly?",
            "Does each position carry **objective support** (cases, explanation, data)?",
            "Do the arguments connect **logically** instead of being a bare list of claims?",
            "Does the conclusion summarize the balanced view and state your **final position** clearly?",
        ],
    },
    Checklist {
        title: "Five checks before submitting",
        items: &[
            "Is the thesis short and unambiguous?",
            "Does each paragraph cover **one key idea** only?",
            "Do topic sentences and their evidence connect smoothly?",
            "Did you delete sentences unrelated to the topic?",
            "Is your own position clear in the conclusion?",
        ],
    },
];
