//! 页面 CSS 选择器
//!
//! 全部针对 U校园 PC 端。选择器维护集中在这一个文件，
//! 策略代码只引用常量，不出现裸字符串。

// ---------- 登录 ----------
pub const LOGIN_AGREEMENT_TEXT: &str = "我已阅读并同意";
pub const LOGIN_USERNAME_PLACEHOLDER: &str = "请输入用户名";
pub const LOGIN_PASSWORD_PLACEHOLDER: &str = "请输入密码";
pub const LOGIN_BUTTON_TEXT: &str = "登录";
pub const LOGIN_KNOWN_POPUP_TEXT: &str = "知道了";
pub const MY_COURSES_TEXT: &str = "我的课程";

// ---------- 课程 / 任务列表 ----------
pub const COURSE_CARD: &str = ".course-card-stu";
pub const COURSE_NAME: &str = ".course-name p";
pub const UNIT_TABS: &str = "[data-index]";
pub const ACTIVE_UNIT_AREA: &str = ".unipus-tabs_itemActive__x0WVI";
pub const TASK_ITEM_CONTAINER: &str = ".courses-unit_taskItemContainer__gkVix";
pub const TASK_ITEM_TYPE_NAME: &str = ".courses-unit_taskTypeName__99BXj";

// ---------- 面包屑 ----------
pub const BREADCRUMB_TEXT: &str = ".pc-break-crumb-text";
pub const ACTIVE_TAB_VIEW: &str = ".pc-header-tab-activity .pc-tab-view-container";
pub const ACTIVE_TASK_TAB: &str = ".pc-header-task-activity";
pub const TASK_TAB_CONTAINER: &str = ".pc-header-tasks-container";
pub const TASK_TAB_ITEM: &str = ".pc-task";

// ---------- 通用操作 ----------
pub const ACTION_BUTTON: &str = ".btn";
pub const SUBMIT_CONFIRM_BUTTON: &str = ".ant-btn-primary";
pub const IKNOW_BUTTON: &str = ".iKnow";
pub const TASK_INFO_POPUP_TEXT: &str = "我知道了";
pub const MODAL_BODY: &str = ".ant-modal-body";

// ---------- 页面结构 ----------
pub const LAYOUT_BODY_CONTAINER: &str = ".layoutBody-container";
pub const HAS_REPLY_CLASS: &str = "has-reply";
pub const MATERIAL_CONTAINER: &str = ".question-common-abs-material";
pub const LAYOUT_MATERIAL_CONTAINER: &str = ".layout-material-container";
pub const ARTICLE_CONTENT: &str = ".comp-common-article-content";
pub const DIRECTION: &str = ".abs-direction";
pub const MEDIA_SOURCE_ELEMENTS: &str = "audio, video";

// ---------- 选择题 ----------
pub const CHOICE_QUESTION_WRAP: &str = "div.question-common-abs-choice";
pub const MULTIPLE_CHOICE_WRAP: &str = "div.question-common-abs-choice.multipleChoice";
pub const OPTION_WRAP: &str = ".option-wrap";
pub const OPTION_ITEM: &str = ".option";

// ---------- 填空题 ----------
pub const FILL_BLANK_REPLY: &str = "div.question-common-abs-scoop.comp-scoop-reply.fill-blank-reply";
pub const FILL_BLANK_QUESTION_AREA: &str = ".question-common-abs-reply";
pub const FILL_BLANK_INPUTS: &str = ".fe-scoop .comp-abs-input input";

// ---------- 拖拽排序题 ----------
pub const SORTABLE_WRAPPER: &str = "#sortableListWrapper";
pub const SEQUENCE_ITEM_TEXT: &str = "div.sequence-reply-view-item-text";

// ---------- 简答题 ----------
pub const SHORT_ANSWER_BOX: &str = ".question-inputbox";
pub const SHORT_ANSWER_HEADER: &str = ".question-inputbox-header .component-htmlview";
pub const SHORT_ANSWER_INPUT: &str = "textarea.question-inputbox-input";

// ---------- 讨论区 ----------
pub const DISCUSSION_REPLY: &str = ".discussion-cloud-reply";
pub const DISCUSSION_TITLE: &str = ".discussion-title p";
pub const DISCUSSION_SUB_QUESTIONS: &str = ".question-common-abs-material .component-htmlview p";
pub const DISCUSSION_TEXTAREA: &str = "textarea.ant-input";
pub const DISCUSSION_PUBLISH_TEXT: &str = "发 布";

// ---------- 自检打钩 ----------
pub const TICKET_VIEW: &str = ".ticket-view";
pub const UNCHECKED_BOX: &str = ".anticon [data-icon='border']";

// ---------- 图片依赖题（防御性跳过） ----------
pub const IMAGE_OPTION_LIST: &str = "div.html_image_list[data-type='options_images_tmls']";

// ---------- 语音题 ----------
pub const RECORD_BUTTON: &str = ".button-record";
pub const RECORDING_STATE_ICON: &str = ".button-record svg path[d*='M645.744']";
pub const SCORE_LAYOUT: &str = "span.score_layout";
pub const ORAL_SENTENCE_CONTAINER: &str = ".oral-study-sentence";
pub const SENTENCE_HTML_CONTAINER: &str = ".sentence-html-container";
pub const ORAL_PERSONAL_WRAPPER: &str = ".p-oral-personal-state .oral-personal-state-wrapper";
pub const ORAL_PERSONAL_QUESTION: &str =
    ".oral-personal-state-oral-container .oral-personal-state-sentence-container .component-htmlview";
pub const ORAL_RECITATION_WRAPPER: &str = ".oral-state-record-wrapper";
pub const ORAL_RECITATION_CONTAINER: &str = ".oral-container.oral-state-record-margin";
pub const ORAL_RECITATION_MAIN_QUESTION: &str = ".score-sentence-container .component-htmlview";
pub const ORAL_RECITATION_KEYWORDS: &str = ".sentence-container .media-sentenceContainer";

// ---------- Role-Play ----------
pub const ROLE_PLAY_ROOT: &str = ".question-role-play";
pub const ROLE_LIST_ITEM: &str = ".role-list .role";
pub const ROLE_PLAY_LIST_BOX: &str = ".role-play-quiz .list-box";
pub const ROLE_TURN_ITEM: &str = ".list-item-review";
pub const ROLE_TURN_SCORE: &str = ".score";
pub const ROLE_TURN_TEXT: &str = ".component-htmlview p";
pub const ROLE_RECORD_SEAT: &str = ".record-seat";
pub const ROLE_TURN_ACTIVE: &str = ".list-item-review.active";
pub const ROLE_PAUSE_ICON: &str = "svg.pause-circle-player";
pub const ROLE_PAUSE_ICON_ACTIVE: &str = "svg.pause-circle-player.active";

// ---------- 答题小结 / 答案解析 ----------
pub const SUMMARY_QUESTION_NUMBER: &str = ".answer-summary .question-number-item";
pub const ANALYSIS_CORRECT_ANSWER_VALUE: &str = ".comp-analysis-panel .correct-answer-value";
pub const REVIEW_QUESTION_GROUP: &str = ".question-review-group";
